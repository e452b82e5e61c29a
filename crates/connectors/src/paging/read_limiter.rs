use conflux_common::config::AppConfig;
use conflux_common::models::DataSourceKind;
use conflux_error::{ConfluxError, ErrorCode, ErrorContext, Result};
use std::collections::HashMap;

/// Hard ceiling on the number of rows one split read may produce.
pub trait ReadLimiter: Send {
    fn add_row(&mut self) -> Result<()>;
}

struct NoopReadLimiter;

impl ReadLimiter for NoopReadLimiter {
    fn add_row(&mut self) -> Result<()> {
        Ok(())
    }
}

struct RowsReadLimiter {
    limit: u64,
    rows_read: u64,
}

impl ReadLimiter for RowsReadLimiter {
    fn add_row(&mut self) -> Result<()> {
        if self.rows_read >= self.limit {
            return Err(ConfluxError::new(
                ErrorCode::ReadLimitExceeded,
                format!("the read limit of {} rows was reached", self.limit),
            )
            .with_context(ErrorContext::ReadLimit {
                rows_read: self.rows_read,
                limit: self.limit,
            })
            .with_hint("Narrow the query or raise read_limits for this backend"));
        }
        self.rows_read += 1;
        Ok(())
    }
}

/// Per-backend row ceilings taken from `read_limits`.
#[derive(Debug, Clone, Default)]
pub struct ReadLimiterFactory {
    limits: HashMap<DataSourceKind, u64>,
}

impl ReadLimiterFactory {
    pub fn new(config: &AppConfig) -> Self {
        let limits = [
            DataSourceKind::PostgreSql,
            DataSourceKind::ClickHouse,
            DataSourceKind::MySql,
            DataSourceKind::MongoDb,
        ]
        .into_iter()
        .filter_map(|kind| config.read_limit_for(kind).map(|limit| (kind, limit)))
        .collect();
        Self { limits }
    }

    pub fn make(&self, kind: DataSourceKind) -> Box<dyn ReadLimiter> {
        match self.limits.get(&kind) {
            Some(&limit) => Box::new(RowsReadLimiter {
                limit,
                rows_read: 0,
            }),
            None => Box::new(NoopReadLimiter),
        }
    }
}
