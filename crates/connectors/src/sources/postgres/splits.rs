use super::connection::quote_identifier;
use super::{fetch_all, schema_name};
use crate::pipeline::Slot;
use crate::sources::rdbms::{Connection, RdbmsDataSource, SplitProvider};
use crate::sources::splits::{parse_histogram_bounds, splits_from_bounds};
use async_trait::async_trait;
use conflux_common::config::SplittingConfig;
use conflux_common::models::DataSourceInstance;
use conflux_error::Result;
use conflux_sql::args::{ArgValue, QueryArgs};
use conflux_sql::query::{Select, SplitDescription};
use conflux_sql::types::CanonicalType;
use tracing::{debug, info, warn};

const TABLE_SIZE_QUERY: &str = "SELECT pg_table_size($1::regclass)::int8";

const PRIMARY_KEY_QUERY: &str = "SELECT kcu.column_name::text, c.data_type::text \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name \
      AND tc.table_schema = kcu.table_schema \
      AND tc.table_name = kcu.table_name \
     JOIN information_schema.columns c \
       ON c.table_schema = kcu.table_schema \
      AND c.table_name = kcu.table_name \
      AND c.column_name = kcu.column_name \
     WHERE tc.constraint_type = 'PRIMARY KEY' \
       AND tc.table_schema = $1 AND tc.table_name = $2 \
     ORDER BY kcu.ordinal_position";

const HISTOGRAM_QUERY: &str = "SELECT histogram_bounds::text FROM pg_stats \
     WHERE schemaname = $1 AND tablename = $2 AND attname = $3";

const INTEGER_KEY_TYPES: &[&str] = &[
    "smallint",
    "integer",
    "bigint",
    "int2",
    "int4",
    "int8",
    "smallserial",
    "serial",
    "bigserial",
];

/// Splits large tables along the `pg_stats` histogram of their integer
/// primary key. Anything else is read as one split.
pub struct HistogramSplitProvider {
    config: SplittingConfig,
}

impl HistogramSplitProvider {
    pub fn new(config: SplittingConfig) -> Self {
        Self { config }
    }

    async fn table_size(
        &self,
        source: &RdbmsDataSource,
        connection: &dyn Connection,
        schema: &str,
        table: &str,
    ) -> Result<Option<i64>> {
        let qualified = format!("{}.{}", quote_identifier(schema), quote_identifier(table));
        let mut args = QueryArgs::new();
        args.add_typed(CanonicalType::Utf8, ArgValue::Text(qualified));

        let rows = fetch_all(source, connection, TABLE_SIZE_QUERY, &args, vec![Slot::Int(None)]).await?;
        Ok(rows.into_iter().next().and_then(|row| match row.first() {
            Some(Slot::Int(size)) => *size,
            _ => None,
        }))
    }

    async fn primary_key(
        &self,
        source: &RdbmsDataSource,
        connection: &dyn Connection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<(String, String)>> {
        let mut args = QueryArgs::new();
        args.add_typed(CanonicalType::Utf8, ArgValue::Text(schema.to_string()));
        args.add_typed(CanonicalType::Utf8, ArgValue::Text(table.to_string()));

        let template = vec![Slot::Text(None), Slot::Text(None)];
        let rows = fetch_all(source, connection, PRIMARY_KEY_QUERY, &args, template).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.as_slice() {
                [Slot::Text(Some(name)), Slot::Text(Some(ty))] => Some((name.clone(), ty.clone())),
                _ => None,
            })
            .collect())
    }

    async fn histogram(
        &self,
        source: &RdbmsDataSource,
        connection: &dyn Connection,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<Option<String>> {
        let mut args = QueryArgs::new();
        args.add_typed(CanonicalType::Utf8, ArgValue::Text(schema.to_string()));
        args.add_typed(CanonicalType::Utf8, ArgValue::Text(table.to_string()));
        args.add_typed(CanonicalType::Utf8, ArgValue::Text(column.to_string()));

        let rows = fetch_all(source, connection, HISTOGRAM_QUERY, &args, vec![Slot::Text(None)]).await?;
        Ok(rows.into_iter().next().and_then(|mut row| match row.pop() {
            Some(Slot::Text(bounds)) => bounds,
            _ => None,
        }))
    }

    async fn plan(
        &self,
        source: &RdbmsDataSource,
        connection: &dyn Connection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<SplitDescription>> {
        let size = self.table_size(source, connection, schema, table).await?;
        let threshold = self.config.table_physical_size_threshold_bytes;
        if size.map_or(true, |s| s < 0 || (s as u64) < threshold) {
            debug!(table, ?size, threshold, "Table is below the splitting threshold");
            return Ok(vec![SplitDescription::Single]);
        }

        let key = self.primary_key(source, connection, schema, table).await?;
        let column = match key.as_slice() {
            [] => {
                info!(table, "Table has no primary key, reading it as one split");
                return Ok(vec![SplitDescription::Single]);
            }
            [(name, ty)] if is_integer_key(ty) => name.clone(),
            _ => {
                info!(table, key = ?key, "Primary key is composite or not an integer, reading it as one split");
                return Ok(vec![SplitDescription::Single]);
            }
        };

        let Some(bounds) = self.histogram(source, connection, schema, table, &column).await? else {
            warn!(table, column = %column, "No histogram statistics for the primary key, run ANALYZE to enable splitting");
            return Ok(vec![SplitDescription::Single]);
        };

        let splits = splits_from_bounds(&column, &parse_histogram_bounds(&bounds)?);
        info!(table, column = %column, splits = splits.len(), "Table split along primary key histogram");
        Ok(splits)
    }
}

fn is_integer_key(data_type: &str) -> bool {
    INTEGER_KEY_TYPES.contains(&data_type.to_lowercase().as_str())
}

#[async_trait]
impl SplitProvider for HistogramSplitProvider {
    async fn list_splits(
        &self,
        source: &RdbmsDataSource,
        instance: &DataSourceInstance,
        select: &Select,
    ) -> Result<Vec<SplitDescription>> {
        if !self.config.enabled {
            return Ok(vec![SplitDescription::Single]);
        }

        let connection = source.open_connection(instance).await?;
        let result = self
            .plan(source, connection.as_ref(), schema_name(instance), &select.table)
            .await;
        if let Err(e) = connection.close().await {
            debug!(error = %e, "Failed to close connection");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_key_types() {
        assert!(is_integer_key("integer"));
        assert!(is_integer_key("BIGINT"));
        assert!(!is_integer_key("uuid"));
        assert!(!is_integer_key("numeric"));
    }

    #[tokio::test]
    async fn test_disabled_splitting_is_one_split() {
        let source = crate::sources::postgres::new_data_source(&Default::default());
        let instance = DataSourceInstance {
            kind: conflux_common::models::DataSourceKind::PostgreSql,
            endpoint: conflux_common::models::Endpoint {
                host: "localhost".into(),
                port: 5432,
            },
            database: "db".into(),
            credentials: Default::default(),
            use_tls: false,
            schema: None,
        };
        let provider = HistogramSplitProvider::new(SplittingConfig::default());
        let select = Select {
            table: "t".into(),
            what: Vec::new(),
            filter: None,
        };
        let splits = provider
            .list_splits(&source, &instance, &select)
            .await
            .unwrap();
        assert_eq!(splits, vec![SplitDescription::Single]);
    }
}
