//! Request-level entry points: `DescribeTable`, `ListSplits` and `ReadSplits`.
//!
//! The transport layer owns the wire types; this module validates requests,
//! dispatches them to the data source of the requested kind and runs one
//! [`Streamer`] per split.

use crate::paging::ReadLimiterFactory;
use crate::sources::{DataSource, DataSourceCollection, ReadSplitRequest};
use crate::streaming::{ResponseWriter, StreamSummary, Streamer};
use crate::type_mapping::TypeMappingSettings;
use arrow::datatypes::Schema;
use conflux_common::config::{AppConfig, PagingConfig};
use conflux_common::models::DataSourceInstance;
use conflux_error::{ConfluxError, ErrorCode, Result};
use conflux_sql::predicate::FilteringMode;
use conflux_sql::query::{Select, SplitDescription};
use conflux_sql::types::{to_arrow_schema, Column};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct DescribeTableRequest {
    pub instance: DataSourceInstance,
    pub table: String,
    pub type_mapping_settings: TypeMappingSettings,
}

#[derive(Debug, Clone)]
pub struct DescribeTableResponse {
    pub columns: Vec<Column>,
}

impl DescribeTableResponse {
    pub fn arrow_schema(&self) -> Schema {
        to_arrow_schema(&self.columns)
    }
}

#[derive(Debug, Clone)]
pub struct ListSplitsRequest {
    pub instance: DataSourceInstance,
    pub selects: Vec<Select>,
}

/// One unit of work handed back to the engine and later passed to `ReadSplits`.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub select: Select,
    pub description: SplitDescription,
}

impl Split {
    /// Opaque payload the engine stores between `ListSplits` and `ReadSplits`.
    pub fn payload(&self) -> Result<Vec<u8>> {
        Ok(self.description.to_bytes()?)
    }

    pub fn from_payload(select: Select, payload: &[u8]) -> Result<Self> {
        Ok(Self {
            select,
            description: SplitDescription::from_bytes(payload)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReadSplitsRequest {
    pub instance: DataSourceInstance,
    pub splits: Vec<Split>,
    pub filtering_mode: FilteringMode,
}

pub struct ConnectorService {
    sources: DataSourceCollection,
    paging: PagingConfig,
    limiters: ReadLimiterFactory,
    token: CancellationToken,
}

impl ConnectorService {
    /// Serves every backend compiled into this build.
    pub fn new(config: &AppConfig) -> Self {
        Self::with_sources(config, DataSourceCollection::from_config(config))
    }

    pub fn with_sources(config: &AppConfig, sources: DataSourceCollection) -> Self {
        Self {
            sources,
            paging: config.paging,
            limiters: ReadLimiterFactory::new(config),
            token: CancellationToken::new(),
        }
    }

    /// Cancels every stream in flight. Later reads fail immediately.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    #[instrument(skip(self, request), fields(kind = %request.instance.kind, table = %request.table))]
    pub async fn describe_table(&self, request: &DescribeTableRequest) -> Result<DescribeTableResponse> {
        validate_table(&request.table)?;
        let source = self.sources.get(request.instance.kind)?;
        let columns = source
            .describe_table(&request.instance, &request.table, &request.type_mapping_settings)
            .await?;
        Ok(DescribeTableResponse { columns })
    }

    #[instrument(skip(self, request), fields(kind = %request.instance.kind, selects = request.selects.len()))]
    pub async fn list_splits(&self, request: &ListSplitsRequest) -> Result<Vec<Split>> {
        let source = self.sources.get(request.instance.kind)?;

        let mut splits = Vec::new();
        for select in &request.selects {
            validate_table(&select.table)?;
            let descriptions = source.list_splits(&request.instance, select).await?;
            info!(table = %select.table, splits = descriptions.len(), "Splits listed");
            splits.extend(descriptions.into_iter().map(|description| Split {
                select: select.clone(),
                description,
            }));
        }
        Ok(splits)
    }

    /// Streams every split in order. Each split ends with its own terminal
    /// message; the first failing split stops the request.
    #[instrument(
        skip(self, request, writer),
        fields(kind = %request.instance.kind, splits = request.splits.len(), mode = %request.filtering_mode)
    )]
    pub async fn read_splits(
        &self,
        request: &ReadSplitsRequest,
        writer: &mut dyn ResponseWriter,
    ) -> Result<StreamSummary> {
        if request.splits.is_empty() {
            return Err(ConfluxError::new(ErrorCode::InvalidRequest, "no splits to read"));
        }
        for split in &request.splits {
            validate_table(&split.select.table)?;
        }
        let source = self.sources.get(request.instance.kind)?;

        let mut total = StreamSummary::default();
        for split in &request.splits {
            let summary = self.read_split(source.clone(), request, split, writer).await?;
            total.pages += summary.pages;
            total.stats.rows += summary.stats.rows;
            total.stats.bytes += summary.stats.bytes;
            total.warnings.extend(summary.warnings);
        }
        info!(rows = total.stats.rows, bytes = total.stats.bytes, pages = total.pages, "Splits read");
        Ok(total)
    }

    async fn read_split(
        &self,
        source: Arc<dyn DataSource>,
        request: &ReadSplitsRequest,
        split: &Split,
        writer: &mut dyn ResponseWriter,
    ) -> Result<StreamSummary> {
        let streamer = Streamer::new(
            source,
            ReadSplitRequest {
                instance: request.instance.clone(),
                select: split.select.clone(),
                split: split.description.clone(),
                filtering: request.filtering_mode,
            },
            self.paging,
            self.limiters.make(request.instance.kind),
            &self.token,
        );
        streamer.run(writer).await
    }
}

fn validate_table(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(ConfluxError::new(ErrorCode::EmptyTableName, "empty table name"));
    }
    Ok(())
}
