use crate::pipeline::Slot;
use crate::sources::rdbms::{Connection, ConnectionManager, Rows};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use conflux_common::models::{DataSourceInstance, DataSourceKind};
use conflux_error::{ConfluxError, ErrorCode, ErrorContext, Result};
use conflux_sql::args::{ArgValue, QueryArg, QueryArgs};
use conflux_sql::types::CanonicalType;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use std::pin::Pin;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row, RowStream};
use tracing::{debug, warn};

type Param = Box<dyn ToSql + Sync + Send>;

pub struct PgConnectionManager {
    open_timeout: Duration,
}

impl PgConnectionManager {
    pub fn new(open_timeout: Duration) -> Self {
        Self { open_timeout }
    }
}

#[async_trait]
impl ConnectionManager for PgConnectionManager {
    async fn make(&self, instance: &DataSourceInstance) -> Result<Box<dyn Connection>> {
        if instance.use_tls {
            return Err(ConfluxError::new(
                ErrorCode::NotImplemented,
                "TLS connections to PostgreSQL are not supported",
            )
            .with_hint("Set use_tls to false or connect through a TLS-terminating proxy"));
        }

        let mut config = tokio_postgres::Config::new();
        config
            .host(&instance.endpoint.host)
            .port(instance.endpoint.port)
            .dbname(&instance.database)
            .user(&instance.credentials.username)
            .password(&instance.credentials.password)
            .connect_timeout(self.open_timeout);

        let connected = tokio::time::timeout(self.open_timeout, config.connect(NoTls))
            .await
            .map_err(|_| {
                ConfluxError::new(
                    ErrorCode::ConnectionTimeout,
                    format!(
                        "could not connect to {}:{} within {:?}",
                        instance.endpoint.host, instance.endpoint.port, self.open_timeout
                    ),
                )
                .with_context(connection_context(instance))
            })?;
        let (client, connection) = connected
            .map_err(|e| backend_error(e).with_context(connection_context(instance)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("Postgres connection error: {}", e);
            }
        });

        if let Some(schema) = &instance.schema {
            client
                .batch_execute(&format!("SET search_path = {}", quote_identifier(schema)))
                .await
                .map_err(|e| backend_error(e).wrap("set search_path"))?;
        }

        debug!(host = %instance.endpoint.host, database = %instance.database, "Connection opened");
        Ok(Box::new(PgConnection { client }))
    }
}

pub struct PgConnection {
    client: Client,
}

#[async_trait]
impl Connection for PgConnection {
    async fn query(&self, text: &str, args: &QueryArgs) -> Result<Box<dyn Rows>> {
        let mut types = Vec::with_capacity(args.count());
        let mut params: Vec<Param> = Vec::with_capacity(args.count());
        for arg in args.iter() {
            let (ty, param) = to_param(arg)?;
            types.push(ty);
            params.push(param);
        }

        let statement = self
            .client
            .prepare_typed(text, &types)
            .await
            .map_err(|e| backend_error(e).wrap("prepare"))?;
        let stream = self
            .client
            .query_raw(&statement, params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)))
            .await
            .map_err(|e| backend_error(e).wrap("query"))?;

        Ok(Box::new(PgRows {
            stream: Box::pin(stream),
        }))
    }
}

pub struct PgRows {
    stream: Pin<Box<RowStream>>,
}

#[async_trait]
impl Rows for PgRows {
    async fn next(&mut self, slots: &mut [Slot]) -> Result<bool> {
        let row = self
            .stream
            .as_mut()
            .try_next()
            .await
            .map_err(|e| backend_error(e).wrap("fetch row"))?;
        let Some(row) = row else {
            return Ok(false);
        };

        if row.len() != slots.len() {
            return Err(ConfluxError::new(
                ErrorCode::PermanentBackendError,
                format!(
                    "query returned {} columns, expected {}",
                    row.len(),
                    slots.len()
                ),
            ));
        }
        for (i, slot) in slots.iter_mut().enumerate() {
            scan_value(&row, i, slot)?;
        }
        Ok(true)
    }
}

fn scan_value(row: &Row, i: usize, slot: &mut Slot) -> Result<()> {
    let ty = row.columns()[i].type_();
    let scan_error = |e: tokio_postgres::Error| {
        ConfluxError::new(
            ErrorCode::PermanentBackendError,
            format!("cannot scan column {} of type {}: {}", i, ty, e),
        )
    };

    match slot {
        Slot::Bool(v) => *v = row.try_get(i).map_err(scan_error)?,
        Slot::Int(v) => {
            *v = match *ty {
                Type::INT2 => row.try_get::<_, Option<i16>>(i).map_err(scan_error)?.map(i64::from),
                Type::INT4 => row.try_get::<_, Option<i32>>(i).map_err(scan_error)?.map(i64::from),
                _ => row.try_get::<_, Option<i64>>(i).map_err(scan_error)?,
            }
        }
        Slot::UInt(v) => *v = row.try_get::<_, Option<u32>>(i).map_err(scan_error)?.map(u64::from),
        Slot::Float32(v) => *v = row.try_get(i).map_err(scan_error)?,
        Slot::Float64(v) => *v = row.try_get(i).map_err(scan_error)?,
        Slot::Bytes(v) => *v = row.try_get(i).map_err(scan_error)?,
        Slot::Text(v) => {
            *v = match *ty {
                Type::DATE => row
                    .try_get::<_, Option<NaiveDate>>(i)
                    .map_err(scan_error)?
                    .map(|d| d.format("%Y-%m-%d").to_string()),
                Type::TIMESTAMP => row
                    .try_get::<_, Option<NaiveDateTime>>(i)
                    .map_err(scan_error)?
                    .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()),
                Type::JSON | Type::JSONB => row
                    .try_get::<_, Option<serde_json::Value>>(i)
                    .map_err(scan_error)?
                    .map(|j| j.to_string()),
                _ => row.try_get(i).map_err(scan_error)?,
            }
        }
        Slot::Date(v) => *v = row.try_get(i).map_err(scan_error)?,
        Slot::Datetime(v) => *v = row.try_get(i).map_err(scan_error)?,
        Slot::Decimal(v) => *v = row.try_get::<_, Option<Decimal>>(i).map_err(scan_error)?,
    }
    Ok(())
}

fn to_param(arg: &QueryArg) -> Result<(Type, Param)> {
    let param: (Type, Param) = match &arg.value {
        ArgValue::Bool(v) => (Type::BOOL, Box::new(*v)),
        ArgValue::Int8(v) => (Type::INT2, Box::new(i16::from(*v))),
        ArgValue::Int16(v) => (Type::INT2, Box::new(*v)),
        ArgValue::Int32(v) => (Type::INT4, Box::new(*v)),
        ArgValue::Int64(v) => (Type::INT8, Box::new(*v)),
        ArgValue::UInt8(v) => (Type::INT2, Box::new(i16::from(*v))),
        ArgValue::UInt16(v) => (Type::INT4, Box::new(i32::from(*v))),
        ArgValue::UInt32(v) => (Type::INT8, Box::new(i64::from(*v))),
        ArgValue::UInt64(v) => {
            let v = i64::try_from(*v).map_err(|_| {
                ConfluxError::new(
                    ErrorCode::InvalidRequest,
                    format!("argument {} does not fit into bigint", v),
                )
            })?;
            (Type::INT8, Box::new(v))
        }
        ArgValue::Float32(v) => (Type::FLOAT4, Box::new(*v)),
        ArgValue::Float64(v) => (Type::FLOAT8, Box::new(*v)),
        ArgValue::Bytes(v) => (Type::BYTEA, Box::new(v.clone())),
        ArgValue::Text(v) => (Type::TEXT, Box::new(v.clone())),
        ArgValue::Decimal(v) => (Type::NUMERIC, Box::new(*v)),
        ArgValue::Date(v) => (Type::DATE, Box::new(*v)),
        ArgValue::Datetime(v) => (Type::TIMESTAMP, Box::new(*v)),
        ArgValue::Null => typed_null(&arg.ty)?,
    };
    Ok(param)
}

/// A NULL bound with the Rust type PostgreSQL expects for `ty`.
fn typed_null(ty: &CanonicalType) -> Result<(Type, Param)> {
    let null: (Type, Param) = match base_type(ty) {
        CanonicalType::Bool => (Type::BOOL, Box::new(None::<bool>)),
        CanonicalType::Int8 | CanonicalType::Int16 | CanonicalType::UInt8 => {
            (Type::INT2, Box::new(None::<i16>))
        }
        CanonicalType::Int32 | CanonicalType::UInt16 => (Type::INT4, Box::new(None::<i32>)),
        CanonicalType::Int64 | CanonicalType::UInt32 | CanonicalType::UInt64 => {
            (Type::INT8, Box::new(None::<i64>))
        }
        CanonicalType::Float32 => (Type::FLOAT4, Box::new(None::<f32>)),
        CanonicalType::Float64 => (Type::FLOAT8, Box::new(None::<f64>)),
        CanonicalType::Bytes => (Type::BYTEA, Box::new(None::<Vec<u8>>)),
        CanonicalType::Utf8 | CanonicalType::Json => (Type::TEXT, Box::new(None::<String>)),
        CanonicalType::Date => (Type::DATE, Box::new(None::<NaiveDate>)),
        CanonicalType::Datetime | CanonicalType::Timestamp => {
            (Type::TIMESTAMP, Box::new(None::<NaiveDateTime>))
        }
        CanonicalType::Decimal { .. } => (Type::NUMERIC, Box::new(None::<Decimal>)),
        other => {
            return Err(ConfluxError::new(
                ErrorCode::UnsupportedType,
                format!("cannot bind a NULL of type {} to a PostgreSQL query", other),
            ))
        }
    };
    Ok(null)
}

fn base_type(ty: &CanonicalType) -> &CanonicalType {
    match ty {
        CanonicalType::Optional(inner) => base_type(inner),
        CanonicalType::Tagged { inner, .. } => base_type(inner),
        other => other,
    }
}

/// Refused or overloaded servers are worth another attempt; any other
/// server-side error is final.
pub(crate) fn backend_error(e: tokio_postgres::Error) -> ConfluxError {
    let transport_failure = e.is_closed()
        || std::error::Error::source(&e).is_some_and(|cause| cause.is::<std::io::Error>());
    let code = classify(e.code(), transport_failure);
    let message = match e.as_db_error() {
        Some(db) => db.message().to_string(),
        None => e.to_string(),
    };
    ConfluxError::new(code, message)
}

/// Only overload states and broken transports are worth another attempt.
fn classify(state: Option<&SqlState>, transport_failure: bool) -> ErrorCode {
    match state {
        Some(state)
            if *state == SqlState::TOO_MANY_CONNECTIONS
                || *state == SqlState::CANNOT_CONNECT_NOW =>
        {
            ErrorCode::RetriableConnectionError
        }
        Some(_) => ErrorCode::PermanentBackendError,
        None if transport_failure => ErrorCode::RetriableConnectionError,
        None => ErrorCode::PermanentBackendError,
    }
}

fn connection_context(instance: &DataSourceInstance) -> ErrorContext {
    ErrorContext::Connection {
        source_kind: DataSourceKind::PostgreSql.as_str().to_string(),
        host: Some(instance.endpoint.host.clone()),
        port: Some(instance.endpoint.port),
        attempts: None,
    }
}

pub(crate) fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
