//! PostgreSQL glue for the relational facade, over `tokio-postgres`.

mod connection;
mod schema;
mod splits;

pub use connection::{PgConnection, PgConnectionManager, PgRows};
pub use schema::PgSchemaProvider;
pub use splits::HistogramSplitProvider;

use super::rdbms::{Connection, Preset, RdbmsDataSource};
use crate::pipeline::Slot;
use crate::type_mapping::PostgreSqlTypeMapper;
use conflux_common::config::AppConfig;
use conflux_common::models::{DataSourceInstance, DataSourceKind};
use conflux_common::retry::RetrierSet;
use conflux_error::Result;
use conflux_sql::args::QueryArgs;
use conflux_sql::dialects::PostgreSqlFormatter;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SCHEMA: &str = "public";

pub fn new_data_source(config: &AppConfig) -> RdbmsDataSource {
    RdbmsDataSource::new(Preset {
        formatter: Arc::new(PostgreSqlFormatter::new(config.pushdown)),
        connection_manager: Arc::new(PgConnectionManager::new(Duration::from_millis(
            config.postgresql.open_connection_timeout_ms,
        ))),
        type_mapper: Arc::new(PostgreSqlTypeMapper),
        schema_provider: Arc::new(PgSchemaProvider),
        split_provider: Arc::new(HistogramSplitProvider::new(config.postgresql.splitting)),
        retriers: RetrierSet::new(&config.retry_for(DataSourceKind::PostgreSql)),
        query_logging: config.logging.enable_sql_query_logging,
    })
}

fn schema_name(instance: &DataSourceInstance) -> &str {
    instance.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
}

/// Runs a catalog query and collects every row, each scanned into a copy of `template`.
async fn fetch_all(
    source: &RdbmsDataSource,
    connection: &dyn Connection,
    text: &str,
    args: &QueryArgs,
    template: Vec<Slot>,
) -> Result<Vec<Vec<Slot>>> {
    let mut rows = source.query(connection, text, args).await?;
    let mut slots = template;
    let mut collected = Vec::new();
    while rows.next(&mut slots).await? {
        collected.push(slots.clone());
    }
    Ok(collected)
}
