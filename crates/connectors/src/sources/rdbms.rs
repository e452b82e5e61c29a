//! Generic facade over a relational backend.

use super::{DataSource, ReadSplitRequest};
use crate::paging::{Sink, SinkFactory};
use crate::pipeline::{Acceptors, Slot};
use crate::type_mapping::{NativeType, SchemaBuilder, TypeMapper, TypeMappingSettings};
use async_trait::async_trait;
use conflux_common::models::DataSourceInstance;
use conflux_common::retry::RetrierSet;
use conflux_common::telemetry::QUERY_LOG_TARGET;
use conflux_error::{ConfluxError, ErrorCode, Result};
use conflux_sql::args::QueryArgs;
use conflux_sql::formatter::SqlFormatter;
use conflux_sql::query::{make_read_splits_query, ReadSplitsQuery, Select, SplitDescription};
use conflux_sql::types::Column;
use std::sync::Arc;
use tracing::{debug, info};

/// Cursor over the rows of one query. Each call overwrites `slots` in place.
#[async_trait]
pub trait Rows: Send {
    /// Scans the next row into `slots`, returning `false` once exhausted.
    async fn next(&mut self, slots: &mut [Slot]) -> Result<bool>;
}

/// One open backend connection, owned by a single read.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn query(&self, text: &str, args: &QueryArgs) -> Result<Box<dyn Rows>>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait ConnectionManager: Send + Sync {
    async fn make(&self, instance: &DataSourceInstance) -> Result<Box<dyn Connection>>;
}

/// Lists the native columns of a table in catalog order.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn list_columns(
        &self,
        source: &RdbmsDataSource,
        connection: &dyn Connection,
        instance: &DataSourceInstance,
        table: &str,
    ) -> Result<Vec<(String, NativeType)>>;
}

#[async_trait]
pub trait SplitProvider: Send + Sync {
    async fn list_splits(
        &self,
        source: &RdbmsDataSource,
        instance: &DataSourceInstance,
        select: &Select,
    ) -> Result<Vec<SplitDescription>>;
}

/// The backend-specific parts of a relational data source. Built once and
/// never mutated afterwards.
pub struct Preset {
    pub formatter: Arc<dyn SqlFormatter>,
    pub connection_manager: Arc<dyn ConnectionManager>,
    pub type_mapper: Arc<dyn TypeMapper>,
    pub schema_provider: Arc<dyn SchemaProvider>,
    pub split_provider: Arc<dyn SplitProvider>,
    pub retriers: RetrierSet,
    /// Log generated query text and redacted arguments.
    pub query_logging: bool,
}

pub struct RdbmsDataSource {
    preset: Preset,
}

impl RdbmsDataSource {
    pub fn new(preset: Preset) -> Self {
        Self { preset }
    }

    pub fn formatter(&self) -> &dyn SqlFormatter {
        self.preset.formatter.as_ref()
    }

    /// Opens a connection under the connection retry policy.
    pub async fn open_connection(&self, instance: &DataSourceInstance) -> Result<Box<dyn Connection>> {
        let manager = self.preset.connection_manager.as_ref();
        self.preset
            .retriers
            .make_connection
            .run("make connection", || manager.make(instance))
            .await
    }

    /// Runs a query under the query retry policy.
    pub async fn query(
        &self,
        connection: &dyn Connection,
        text: &str,
        args: &QueryArgs,
    ) -> Result<Box<dyn Rows>> {
        if self.preset.query_logging {
            debug!(
                target: QUERY_LOG_TARGET,
                dialect = self.formatter().dialect_name(),
                query = text,
                args = %args.to_log_string(),
                "Executing query"
            );
        }
        self.preset
            .retriers
            .query
            .run("query", || connection.query(text, args))
            .await
    }

    async fn scan(
        &self,
        instance: &DataSourceInstance,
        query: &ReadSplitsQuery,
        sink: &mut Sink,
    ) -> Result<()> {
        let connection = self.open_connection(instance).await?;
        let result = self.scan_rows(connection.as_ref(), query, sink).await;
        if let Err(e) = connection.close().await {
            debug!(error = %e, "Failed to close connection");
        }
        result
    }

    async fn scan_rows(
        &self,
        connection: &dyn Connection,
        query: &ReadSplitsQuery,
        sink: &mut Sink,
    ) -> Result<()> {
        let mut rows = self.query(connection, &query.text, &query.args).await?;
        let mut slots = Acceptors::for_columns(&query.scan_columns)
            .map_err(|e| e.to_conflux_error(sink.table()))?;
        let token = sink.token();

        loop {
            let more = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(ConfluxError::new(ErrorCode::StreamCancelled, "the read was cancelled"));
                }
                more = rows.next(&mut slots) => more?,
            };
            if !more {
                return Ok(());
            }
            sink.add_row(&slots).await?;
        }
    }
}

#[async_trait]
impl DataSource for RdbmsDataSource {
    async fn describe_table(
        &self,
        instance: &DataSourceInstance,
        table: &str,
        settings: &TypeMappingSettings,
    ) -> Result<Vec<Column>> {
        if table.is_empty() {
            return Err(ConfluxError::new(ErrorCode::EmptyTableName, "empty table name"));
        }

        let connection = self.open_connection(instance).await?;
        let listed = self
            .preset
            .schema_provider
            .list_columns(self, connection.as_ref(), instance, table)
            .await;
        if let Err(e) = connection.close().await {
            debug!(error = %e, "Failed to close connection");
        }

        let mut builder = SchemaBuilder::new(table, self.preset.type_mapper.as_ref(), *settings);
        for (name, native) in listed? {
            builder.add_column(name, &native);
        }
        let columns = builder.build_columns()?;
        info!(table, columns = columns.len(), "Table described");
        Ok(columns)
    }

    async fn list_splits(
        &self,
        instance: &DataSourceInstance,
        select: &Select,
    ) -> Result<Vec<SplitDescription>> {
        self.preset
            .split_provider
            .list_splits(self, instance, select)
            .await
    }

    async fn read_split(&self, request: &ReadSplitRequest, sink_factory: SinkFactory) -> Result<()> {
        let formatter = self.formatter();
        let query = make_read_splits_query(formatter, &request.select, &request.split, request.filtering)
            .map_err(|e| e.to_conflux_error(formatter.dialect_name()))?;

        let mut sink = sink_factory.make(&query.scan_columns, &query.output_columns)?;
        if let Err(e) = self.scan(&request.instance, &query, &mut sink).await {
            sink.add_error(e);
        }
        sink.finish().await?;

        let stats = sink.stats();
        debug!(
            table = %request.select.table,
            rows = stats.rows,
            bytes = stats.bytes,
            "Split read finished"
        );
        Ok(())
    }
}
