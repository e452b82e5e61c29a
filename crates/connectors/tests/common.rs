#![allow(dead_code)]

use arrow::ipc::reader::StreamReader;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use conflux_common::config::{AppConfig, PushdownConfig};
use conflux_common::models::{Credentials, DataSourceInstance, DataSourceKind, Endpoint};
use conflux_common::retry::RetrierSet;
use conflux_connectors::pipeline::Slot;
use conflux_connectors::sources::rdbms::{
    Connection, ConnectionManager, Preset, RdbmsDataSource, Rows, SchemaProvider,
};
use conflux_connectors::sources::splits::SingleSplitProvider;
use conflux_connectors::streaming::{ReadSplitsResponse, ResponseWriter};
use conflux_connectors::type_mapping::{NativeType, PostgreSqlTypeMapper};
use conflux_connectors::{ConnectorService, DataSourceCollection};
use conflux_error::{ConfluxError, ErrorCode, Result};
use conflux_sql::args::QueryArgs;
use conflux_sql::dialects::PostgreSqlFormatter;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

/// A table served from memory. Every query returns all of `rows`.
#[derive(Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<(String, NativeType)>,
    pub rows: Vec<Vec<Slot>>,
    /// Fails the scan after this many rows.
    pub fail_after: Option<usize>,
}

impl MemoryTable {
    pub fn new(columns: &[(&str, &str)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, ty)| (name.to_string(), NativeType::new(*ty)))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Slot>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }
}

/// Every statement issued against the in-memory backend.
pub type QueryLog = Arc<Mutex<Vec<(String, QueryArgs)>>>;

struct MemoryConnectionManager {
    table: MemoryTable,
    log: QueryLog,
}

#[async_trait]
impl ConnectionManager for MemoryConnectionManager {
    async fn make(&self, _instance: &DataSourceInstance) -> Result<Box<dyn Connection>> {
        Ok(Box::new(MemoryConnection {
            table: self.table.clone(),
            log: self.log.clone(),
        }))
    }
}

struct MemoryConnection {
    table: MemoryTable,
    log: QueryLog,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn query(&self, text: &str, args: &QueryArgs) -> Result<Box<dyn Rows>> {
        self.log.lock().unwrap().push((text.to_string(), args.clone()));
        Ok(Box::new(MemoryRows {
            rows: self.table.rows.clone().into_iter(),
            served: 0,
            fail_after: self.table.fail_after,
        }))
    }
}

struct MemoryRows {
    rows: std::vec::IntoIter<Vec<Slot>>,
    served: usize,
    fail_after: Option<usize>,
}

#[async_trait]
impl Rows for MemoryRows {
    async fn next(&mut self, slots: &mut [Slot]) -> Result<bool> {
        if self.fail_after == Some(self.served) {
            return Err(ConfluxError::new(
                ErrorCode::PermanentBackendError,
                "connection reset by peer",
            ));
        }
        let Some(row) = self.rows.next() else {
            return Ok(false);
        };
        slots.clone_from_slice(&row);
        self.served += 1;
        Ok(true)
    }
}

struct MemorySchemaProvider {
    columns: Vec<(String, NativeType)>,
}

#[async_trait]
impl SchemaProvider for MemorySchemaProvider {
    async fn list_columns(
        &self,
        _source: &RdbmsDataSource,
        _connection: &dyn Connection,
        _instance: &DataSourceInstance,
        _table: &str,
    ) -> Result<Vec<(String, NativeType)>> {
        Ok(self.columns.clone())
    }
}

/// A PostgreSQL-flavoured data source backed by `table`.
pub fn memory_source(table: MemoryTable) -> (RdbmsDataSource, QueryLog) {
    let log = QueryLog::default();
    let source = RdbmsDataSource::new(Preset {
        formatter: Arc::new(PostgreSqlFormatter::new(PushdownConfig::default())),
        connection_manager: Arc::new(MemoryConnectionManager {
            table: table.clone(),
            log: log.clone(),
        }),
        type_mapper: Arc::new(PostgreSqlTypeMapper),
        schema_provider: Arc::new(MemorySchemaProvider {
            columns: table.columns,
        }),
        split_provider: Arc::new(SingleSplitProvider),
        retriers: RetrierSet::noop(),
        query_logging: true,
    });
    (source, log)
}

pub fn memory_service(config: &AppConfig, table: MemoryTable) -> (ConnectorService, QueryLog) {
    let (source, log) = memory_source(table);
    let mut sources = DataSourceCollection::new();
    sources.register(DataSourceKind::PostgreSql, Arc::new(source));
    (ConnectorService::with_sources(config, sources), log)
}

pub fn instance(kind: DataSourceKind) -> DataSourceInstance {
    DataSourceInstance {
        kind,
        endpoint: Endpoint {
            host: "localhost".to_string(),
            port: 5432,
        },
        database: "shop".to_string(),
        credentials: Credentials {
            username: "reader".to_string(),
            password: "secret".to_string(),
        },
        use_tls: false,
        schema: None,
    }
}

/// Collects every response written to the stream.
#[derive(Default)]
pub struct CollectingWriter {
    pub responses: Vec<ReadSplitsResponse>,
    /// Rejects every send after this many succeeded.
    pub fail_after: Option<usize>,
}

#[async_trait]
impl ResponseWriter for CollectingWriter {
    async fn send(&mut self, response: ReadSplitsResponse) -> Result<()> {
        if self.fail_after == Some(self.responses.len()) {
            return Err(ConfluxError::new(
                ErrorCode::StreamCancelled,
                "client went away",
            ));
        }
        self.responses.push(response);
        Ok(())
    }
}

pub fn decode(response: &ReadSplitsResponse) -> Vec<RecordBatch> {
    StreamReader::try_new(Cursor::new(response.arrow_ipc.clone()), None)
        .unwrap()
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap()
}

pub fn row_count(response: &ReadSplitsResponse) -> usize {
    decode(response).iter().map(|b| b.num_rows()).sum()
}
