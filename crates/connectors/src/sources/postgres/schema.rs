use super::{fetch_all, schema_name};
use crate::pipeline::Slot;
use crate::sources::rdbms::{Connection, RdbmsDataSource, SchemaProvider};
use crate::type_mapping::NativeType;
use async_trait::async_trait;
use conflux_common::models::DataSourceInstance;
use conflux_error::{invariant_violation, Result};
use conflux_sql::args::{ArgValue, QueryArgs};
use conflux_sql::types::CanonicalType;

const LIST_COLUMNS_QUERY: &str = "SELECT column_name::text, data_type::text, \
     numeric_precision::int4, numeric_scale::int4 \
     FROM information_schema.columns \
     WHERE table_name = $1 AND table_schema = $2 \
     ORDER BY ordinal_position";

/// Reads column descriptors from `information_schema.columns`.
pub struct PgSchemaProvider;

#[async_trait]
impl SchemaProvider for PgSchemaProvider {
    async fn list_columns(
        &self,
        source: &RdbmsDataSource,
        connection: &dyn Connection,
        instance: &DataSourceInstance,
        table: &str,
    ) -> Result<Vec<(String, NativeType)>> {
        let mut args = QueryArgs::new();
        args.add_typed(CanonicalType::Utf8, ArgValue::Text(table.to_string()));
        args.add_typed(CanonicalType::Utf8, ArgValue::Text(schema_name(instance).to_string()));

        let template = vec![Slot::Text(None), Slot::Text(None), Slot::Int(None), Slot::Int(None)];
        let rows = fetch_all(source, connection, LIST_COLUMNS_QUERY, &args, template).await?;

        rows.into_iter().map(native_column).collect()
    }
}

fn native_column(row: Vec<Slot>) -> Result<(String, NativeType)> {
    let row = <[Slot; 4]>::try_from(row)
        .map_err(|r| invariant_violation(format!("unexpected column row {:?}", r)))?;

    match row {
        [Slot::Text(Some(name)), Slot::Text(Some(type_name)), Slot::Int(precision), Slot::Int(scale)] => {
            let precision = precision.and_then(|p| u32::try_from(p).ok());
            let scale = scale.and_then(|s| u32::try_from(s).ok());
            Ok((
                name,
                NativeType::new(type_name).with_precision_scale(precision, scale),
            ))
        }
        other => Err(invariant_violation(format!("column name or type is null: {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_column_carries_numeric_params() {
        let row = vec![
            Slot::Text(Some("price".into())),
            Slot::Text(Some("numeric".into())),
            Slot::Int(Some(10)),
            Slot::Int(Some(2)),
        ];
        let (name, native) = native_column(row).unwrap();
        assert_eq!(name, "price");
        assert_eq!(native.name, "numeric");
        assert_eq!(native.precision, Some(10));
        assert_eq!(native.scale, Some(2));
    }

    #[test]
    fn test_native_column_without_params() {
        let row = vec![
            Slot::Text(Some("title".into())),
            Slot::Text(Some("text".into())),
            Slot::Int(None),
            Slot::Int(None),
        ];
        let (_, native) = native_column(row).unwrap();
        assert_eq!(native, NativeType::new("text"));
    }
}
