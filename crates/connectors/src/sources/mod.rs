//! Data source facades.
//!
//! Every backend is served through the [`DataSource`] contract. Relational
//! backends share one generic facade, [`rdbms::RdbmsDataSource`], assembled
//! from a [`rdbms::Preset`] of backend-specific parts.
//!
//! | Kind         | Facade            | Driver                       |
//! |--------------|-------------------|------------------------------|
//! | `postgresql` | `RdbmsDataSource` | `tokio-postgres` (`postgres` feature) |

use crate::paging::SinkFactory;
use crate::type_mapping::TypeMappingSettings;
use async_trait::async_trait;
use conflux_common::config::AppConfig;
use conflux_common::models::{DataSourceInstance, DataSourceKind};
use conflux_error::{ConfluxError, ErrorCode, Result};
use conflux_sql::predicate::FilteringMode;
use conflux_sql::query::{Select, SplitDescription};
use conflux_sql::types::Column;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod rdbms;
pub mod splits;

/// Everything the producer of one split read needs.
#[derive(Debug, Clone)]
pub struct ReadSplitRequest {
    pub instance: DataSourceInstance,
    pub select: Select,
    pub split: SplitDescription,
    pub filtering: FilteringMode,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Columns of `table` the connector can represent, in catalog order.
    async fn describe_table(
        &self,
        instance: &DataSourceInstance,
        table: &str,
        settings: &TypeMappingSettings,
    ) -> Result<Vec<Column>>;

    async fn list_splits(
        &self,
        instance: &DataSourceInstance,
        select: &Select,
    ) -> Result<Vec<SplitDescription>>;

    /// Reads one split into the sink built from `sink_factory`.
    ///
    /// Failures after the sink exists are reported through the sink and the
    /// call returns `Ok`. An `Err` means the sink was never built.
    async fn read_split(&self, request: &ReadSplitRequest, sink_factory: SinkFactory) -> Result<()>;
}

/// Data sources by backend kind.
#[derive(Default, Clone)]
pub struct DataSourceCollection {
    sources: HashMap<DataSourceKind, Arc<dyn DataSource>>,
}

impl DataSourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backends compiled into this build.
    pub fn from_config(config: &AppConfig) -> Self {
        #[allow(unused_mut)]
        let mut collection = Self::new();
        #[cfg(feature = "postgres")]
        collection.register(
            DataSourceKind::PostgreSql,
            Arc::new(postgres::new_data_source(config)),
        );
        #[cfg(not(feature = "postgres"))]
        let _ = config;
        collection
    }

    pub fn register(&mut self, kind: DataSourceKind, source: Arc<dyn DataSource>) {
        self.sources.insert(kind, source);
    }

    pub fn get(&self, kind: DataSourceKind) -> Result<Arc<dyn DataSource>> {
        self.sources.get(&kind).cloned().ok_or_else(|| {
            ConfluxError::new(
                ErrorCode::UnsupportedSourceType,
                format!("data source kind '{}' is not served by this connector", kind),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind() {
        let collection = DataSourceCollection::new();
        let err = collection.get(DataSourceKind::MongoDb).err().unwrap();
        assert_eq!(err.code, ErrorCode::UnsupportedSourceType);
    }
}
