mod common;

use common::{instance, memory_service, MemoryTable};
use conflux_common::config::AppConfig;
use conflux_common::models::DataSourceKind;
use conflux_connectors::type_mapping::{DateTimeFormat, NativeType, TypeMappingSettings};
use conflux_connectors::DescribeTableRequest;
use conflux_error::ErrorCode;
use conflux_sql::types::CanonicalType;

fn describe(table: &str, settings: TypeMappingSettings) -> DescribeTableRequest {
    DescribeTableRequest {
        instance: instance(DataSourceKind::PostgreSql),
        table: table.to_string(),
        type_mapping_settings: settings,
    }
}

#[tokio::test]
async fn test_unsupported_columns_are_dropped() {
    let mut table = MemoryTable::new(&[
        ("id", "bigint"),
        ("search", "tsvector"),
        ("created", "date"),
    ]);
    table.columns.push((
        "price".to_string(),
        NativeType::new("numeric").with_precision_scale(Some(10), Some(2)),
    ));
    // numeric without precision/scale cannot be represented
    table
        .columns
        .push(("ratio".to_string(), NativeType::new("numeric")));
    let (service, _) = memory_service(&AppConfig::default(), table);

    let response = service
        .describe_table(&describe("orders", TypeMappingSettings::default()))
        .await
        .unwrap();

    let names: Vec<&str> = response.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "created", "price"]);
    assert_eq!(
        response.columns[0].ty,
        CanonicalType::optional(CanonicalType::Int64)
    );
    assert_eq!(
        response.columns[1].ty,
        CanonicalType::optional(CanonicalType::Date)
    );
    assert_eq!(
        response.columns[2].ty,
        CanonicalType::optional(CanonicalType::Decimal {
            precision: 10,
            scale: 2
        })
    );
    assert!(response
        .arrow_schema()
        .fields()
        .iter()
        .all(|f| f.is_nullable()));
}

#[tokio::test]
async fn test_string_date_time_format() {
    let table = MemoryTable::new(&[("created", "timestamp without time zone")]);
    let (service, _) = memory_service(&AppConfig::default(), table);
    let settings = TypeMappingSettings {
        date_time_format: DateTimeFormat::String,
    };

    let response = service
        .describe_table(&describe("events", settings))
        .await
        .unwrap();
    assert_eq!(
        response.columns[0].ty,
        CanonicalType::optional(CanonicalType::Utf8)
    );
}

#[tokio::test]
async fn test_table_without_columns_is_not_found() {
    let (service, _) = memory_service(&AppConfig::default(), MemoryTable::new(&[]));
    let err = service
        .describe_table(&describe("missing", TypeMappingSettings::default()))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TableNotFound);
}

#[tokio::test]
async fn test_empty_table_name() {
    let (service, _) = memory_service(&AppConfig::default(), MemoryTable::new(&[("id", "int4")]));
    let err = service
        .describe_table(&describe("", TypeMappingSettings::default()))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EmptyTableName);
}
