mod common;

use arrow::array::{
    Array, BinaryArray, Date32Array, Decimal128Array, Int32Array, StringArray,
    TimestampMicrosecondArray, TimestampSecondArray,
};
use chrono::NaiveDate;
use common::{decode, instance, memory_service, row_count, CollectingWriter, MemoryTable};
use conflux_common::config::AppConfig;
use conflux_common::models::DataSourceKind;
use conflux_connectors::pipeline::Slot;
use conflux_connectors::{ReadSplitsRequest, Split};
use conflux_error::{ErrorCode, StatusCode};
use conflux_sql::expr::{Expression, Predicate};
use conflux_sql::predicate::FilteringMode;
use conflux_sql::query::{Select, SplitDescription};
use conflux_sql::types::{CanonicalType, Column, OBJECT_ID_TAG, TAG_METADATA_KEY};
use rust_decimal::Decimal;
use std::str::FromStr;

fn orders_table(rows: usize) -> MemoryTable {
    MemoryTable::new(&[("id", "integer"), ("name", "text")]).with_rows(
        (0..rows)
            .map(|i| {
                vec![
                    Slot::Int(Some(i as i64)),
                    Slot::Text(Some(format!("order-{}", i))),
                ]
            })
            .collect(),
    )
}

fn orders_select() -> Select {
    Select {
        table: "orders".to_string(),
        what: vec![
            Column::new("id", CanonicalType::optional(CanonicalType::Int32)),
            Column::new("name", CanonicalType::optional(CanonicalType::Utf8)),
        ],
        filter: None,
    }
}

fn request(select: Select) -> ReadSplitsRequest {
    ReadSplitsRequest {
        instance: instance(DataSourceKind::PostgreSql),
        splits: vec![Split {
            select,
            description: SplitDescription::Single,
        }],
        filtering_mode: FilteringMode::Optional,
    }
}

fn config_with_rows_per_page(rows: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.paging.rows_per_page = rows;
    config.paging.bytes_per_page = 0;
    config
}

#[tokio::test]
async fn test_row_budget_splits_pages_in_order() {
    let (service, _) = memory_service(&config_with_rows_per_page(2), orders_table(5));
    let mut writer = CollectingWriter::default();

    let summary = service
        .read_splits(&request(orders_select()), &mut writer)
        .await
        .unwrap();

    let counts: Vec<usize> = writer.responses.iter().map(row_count).collect();
    assert_eq!(counts, vec![2, 2, 1]);
    let terminal: Vec<bool> = writer.responses.iter().map(|r| r.is_terminal).collect();
    assert_eq!(terminal, vec![false, false, true]);
    assert!(writer
        .responses
        .iter()
        .all(|r| r.status == StatusCode::Success && r.error.is_none()));

    let ids: Vec<i32> = writer
        .responses
        .iter()
        .flat_map(decode)
        .flat_map(|batch| {
            let ids = batch
                .column(0)
                .as_any()
                .downcast_ref::<Int32Array>()
                .unwrap()
                .clone();
            ids.values().to_vec()
        })
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.stats.rows, 5);
}

#[tokio::test]
async fn test_null_values_survive_the_round_trip() {
    let table = MemoryTable::new(&[("id", "integer"), ("name", "text")]).with_rows(vec![
        vec![Slot::Int(Some(1)), Slot::Text(None)],
        vec![Slot::Int(None), Slot::Text(Some("b".into()))],
    ]);
    let (service, _) = memory_service(&AppConfig::default(), table);
    let mut writer = CollectingWriter::default();

    service
        .read_splits(&request(orders_select()), &mut writer)
        .await
        .unwrap();

    assert_eq!(writer.responses.len(), 1);
    let batches = decode(&writer.responses[0]);
    let batch = &batches[0];
    assert!(batch.schema().field(0).is_nullable());

    let ids = batch.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
    let names = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(ids.value(0), 1);
    assert!(ids.is_null(1));
    assert!(names.is_null(0));
    assert_eq!(names.value(1), "b");
}

fn typed_select() -> Select {
    let optional = CanonicalType::optional;
    Select {
        table: "events".to_string(),
        what: vec![
            Column::new("amount", optional(CanonicalType::Decimal { precision: 5, scale: 2 })),
            Column::new("day", optional(CanonicalType::Date)),
            Column::new("seen", optional(CanonicalType::Datetime)),
            Column::new("at", optional(CanonicalType::Timestamp)),
            Column::new("blob", optional(CanonicalType::Bytes)),
            Column::new(
                "_id",
                optional(CanonicalType::tagged(OBJECT_ID_TAG, CanonicalType::Utf8)),
            ),
        ],
        filter: None,
    }
}

#[tokio::test]
async fn test_typed_columns_survive_the_round_trip() {
    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let at = day.and_hms_micro_opt(12, 0, 0, 123_456).unwrap();
    let before_epoch = NaiveDate::from_ymd_opt(1960, 1, 1).unwrap();
    let object_id = vec![0x50, 0x7f, 0x1f, 0x77, 0xbc, 0xf8, 0x6c, 0xd7, 0x99, 0x43, 0x90, 0x11];

    let table = MemoryTable::new(&[]).with_rows(vec![
        vec![
            Slot::Decimal(Some(Decimal::from_str("123.45").unwrap())),
            Slot::Date(Some(day)),
            Slot::Datetime(Some(at)),
            Slot::Datetime(Some(at)),
            Slot::Bytes(Some(vec![0, 1, 2])),
            Slot::Bytes(Some(object_id)),
        ],
        vec![
            Slot::Decimal(None),
            Slot::Date(None),
            Slot::Datetime(None),
            Slot::Datetime(None),
            Slot::Bytes(None),
            Slot::Bytes(None),
        ],
        vec![
            Slot::Decimal(Some(Decimal::from_str("123456.78").unwrap())),
            Slot::Date(Some(before_epoch)),
            Slot::Datetime(Some(before_epoch.and_hms_opt(0, 0, 0).unwrap())),
            Slot::Datetime(Some(before_epoch.and_hms_opt(0, 0, 0).unwrap())),
            Slot::Bytes(Some(Vec::new())),
            Slot::Bytes(None),
        ],
    ]);
    let (service, _) = memory_service(&AppConfig::default(), table);
    let mut writer = CollectingWriter::default();

    let summary = service
        .read_splits(&request(typed_select()), &mut writer)
        .await
        .unwrap();
    assert_eq!(summary.stats.rows, 3);

    let batches = decode(&writer.responses[0]);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 3);
    assert!(batch.schema().fields().iter().all(|f| f.is_nullable()));
    assert_eq!(
        batch
            .schema()
            .field(5)
            .metadata()
            .get(TAG_METADATA_KEY)
            .map(String::as_str),
        Some(OBJECT_ID_TAG)
    );

    let amount = batch.column(0).as_any().downcast_ref::<Decimal128Array>().unwrap();
    assert_eq!(amount.precision(), 5);
    assert_eq!(amount.scale(), 2);
    assert_eq!(amount.value(0), 12_345);
    assert!(amount.is_null(1));
    assert!(amount.is_null(2));

    let days = batch.column(1).as_any().downcast_ref::<Date32Array>().unwrap();
    assert_eq!(days.value(0), 19_783);
    assert!(days.is_null(1));
    assert!(days.is_null(2));

    let seen = batch.column(2).as_any().downcast_ref::<TimestampSecondArray>().unwrap();
    assert_eq!(seen.value(0), 1_709_294_400);
    assert!(seen.is_null(1));
    assert!(seen.is_null(2));

    let micros = batch
        .column(3)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .unwrap();
    assert_eq!(micros.value(0), 1_709_294_400_123_456);
    assert!(micros.is_null(1));
    assert!(micros.is_null(2));

    let blobs = batch.column(4).as_any().downcast_ref::<BinaryArray>().unwrap();
    assert_eq!(blobs.value(0), &[0, 1, 2]);
    assert!(blobs.is_null(1));
    assert!(!blobs.is_null(2));
    assert!(blobs.value(2).is_empty());

    let ids = batch.column(5).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(ids.value(0), "507f1f77bcf86cd799439011");
    assert!(ids.is_null(1));
    assert!(ids.is_null(2));
}

#[tokio::test]
async fn test_empty_table_ends_with_empty_terminal_message() {
    let (service, _) = memory_service(&AppConfig::default(), orders_table(0));
    let mut writer = CollectingWriter::default();

    let summary = service
        .read_splits(&request(orders_select()), &mut writer)
        .await
        .unwrap();

    assert_eq!(writer.responses.len(), 1);
    let last = &writer.responses[0];
    assert!(last.is_terminal);
    assert_eq!(last.status, StatusCode::Success);
    assert_eq!(row_count(last), 0);
    assert_eq!(summary.stats.rows, 0);
}

#[tokio::test]
async fn test_row_count_only_read() {
    let table = MemoryTable::new(&[("id", "integer")])
        .with_rows((0..3).map(|_| vec![Slot::Int(Some(0))]).collect());
    let (service, log) = memory_service(&AppConfig::default(), table);
    let mut writer = CollectingWriter::default();
    let select = Select {
        table: "orders".to_string(),
        what: Vec::new(),
        filter: None,
    };

    let summary = service.read_splits(&request(select), &mut writer).await.unwrap();

    assert_eq!(summary.stats.rows, 3);
    assert!(writer.responses.last().unwrap().is_terminal);
    let queries = log.lock().unwrap();
    assert!(queries[0].0.starts_with("SELECT 0 FROM \"orders\""));
}

#[tokio::test]
async fn test_filter_is_pushed_down_with_bound_arguments() {
    let (service, log) = memory_service(&AppConfig::default(), orders_table(1));
    let mut writer = CollectingWriter::default();
    let mut select = orders_select();
    select.filter = Some(Predicate::equal(
        Expression::column("id"),
        Expression::int32(42),
    ));

    service.read_splits(&request(select), &mut writer).await.unwrap();

    let queries = log.lock().unwrap();
    assert_eq!(queries.len(), 1);
    let (text, args) = &queries[0];
    assert!(text.starts_with("SELECT \"id\", \"name\" FROM \"orders\""));
    assert!(text.contains("(\"id\" = $1)"));
    assert_eq!(args.count(), 1);
}

#[tokio::test]
async fn test_read_limit_ends_the_stream_with_an_error() {
    let mut config = config_with_rows_per_page(2);
    config
        .read_limits
        .insert(DataSourceKind::PostgreSql.as_str().to_string(), 3);
    let (service, _) = memory_service(&config, orders_table(5));
    let mut writer = CollectingWriter::default();

    let err = service
        .read_splits(&request(orders_select()), &mut writer)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ReadLimitExceeded);
    let last = writer.responses.last().unwrap();
    assert!(last.is_terminal);
    assert_eq!(last.status, StatusCode::BadRequest);
    assert_eq!(last.error.as_ref().unwrap().code, ErrorCode::ReadLimitExceeded);
}

#[tokio::test]
async fn test_scan_failure_ends_the_stream_with_an_error() {
    let (service, _) = memory_service(&AppConfig::default(), orders_table(5).failing_after(1));
    let mut writer = CollectingWriter::default();

    let err = service
        .read_splits(&request(orders_select()), &mut writer)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::PermanentBackendError);
    let last = writer.responses.last().unwrap();
    assert!(last.is_terminal);
    assert_eq!(last.status, StatusCode::Unavailable);
}

#[tokio::test]
async fn test_writer_failure_stops_the_producer() {
    let mut config = config_with_rows_per_page(1);
    config.paging.prefetch_queue_capacity = 1;
    let (service, _) = memory_service(&config, orders_table(100));
    let mut writer = CollectingWriter {
        fail_after: Some(0),
        ..CollectingWriter::default()
    };

    let err = service
        .read_splits(&request(orders_select()), &mut writer)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::StreamCancelled);
    assert!(writer.responses.is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_new_reads() {
    let (service, _) = memory_service(&AppConfig::default(), orders_table(5));
    service.shutdown();
    let mut writer = CollectingWriter::default();

    let err = service
        .read_splits(&request(orders_select()), &mut writer)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::StreamCancelled);
    let last = writer.responses.last().unwrap();
    assert_eq!(last.status, StatusCode::Cancelled);
    assert!(last.is_terminal);
}

#[tokio::test]
async fn test_unknown_kind_is_rejected() {
    let (service, _) = memory_service(&AppConfig::default(), orders_table(1));
    let mut req = request(orders_select());
    req.instance = instance(DataSourceKind::MySql);
    let mut writer = CollectingWriter::default();

    let err = service.read_splits(&req, &mut writer).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsupportedSourceType);
    assert!(writer.responses.is_empty());
}

#[tokio::test]
async fn test_empty_table_name_is_rejected() {
    let (service, _) = memory_service(&AppConfig::default(), orders_table(1));
    let mut select = orders_select();
    select.table = String::new();
    let mut writer = CollectingWriter::default();

    let err = service.read_splits(&request(select), &mut writer).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::EmptyTableName);
}
