use super::buffer::{ColumnarBuffer, Page};
use super::read_limiter::ReadLimiter;
use super::traffic::{PageStats, TrafficTracker};
use crate::pipeline::{RowTransformer, Slot};
use conflux_common::config::PagingConfig;
use conflux_error::{invariant_violation, ConfluxError, ErrorCode, Result};
use conflux_sql::types::Column;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Operational,
    Failed,
    Finished,
}

/// Everything a data source needs to build the [`Sink`] of one split read.
pub struct SinkFactory {
    table: String,
    paging: PagingConfig,
    limiter: Box<dyn ReadLimiter>,
    results: mpsc::Sender<Page>,
    errors: mpsc::Sender<ConfluxError>,
    token: CancellationToken,
}

impl SinkFactory {
    pub fn new(
        table: impl Into<String>,
        paging: PagingConfig,
        limiter: Box<dyn ReadLimiter>,
        results: mpsc::Sender<Page>,
        errors: mpsc::Sender<ConfluxError>,
        token: CancellationToken,
    ) -> Self {
        Self {
            table: table.into(),
            paging,
            limiter,
            results,
            errors,
            token,
        }
    }

    /// `scan_columns` is what the driver returns, `output_columns` what the
    /// client receives. They differ only for row-count-only reads.
    pub fn make(self, scan_columns: &[Column], output_columns: &[Column]) -> Result<Sink> {
        if !output_columns.is_empty() && scan_columns.len() != output_columns.len() {
            return Err(invariant_violation(format!(
                "scan columns ({}) and output columns ({}) differ in width",
                scan_columns.len(),
                output_columns.len()
            )));
        }
        let transformer = RowTransformer::new(output_columns)
            .map_err(|e| e.to_conflux_error(&self.table))?;

        Ok(Sink {
            table: self.table,
            state: SinkState::Operational,
            tracker: TrafficTracker::new(self.paging),
            limiter: self.limiter,
            buffer: ColumnarBuffer::new(output_columns),
            transformer,
            results: Some(self.results),
            errors: Some(self.errors),
            token: self.token,
        })
    }
}

/// Accumulates scanned rows into bounded pages and hands sealed pages to the
/// result queue.
///
/// `Operational → Failed | Finished`. Calls outside the allowed states are
/// invariant violations and panic.
pub struct Sink {
    table: String,
    state: SinkState,
    tracker: TrafficTracker,
    limiter: Box<dyn ReadLimiter>,
    buffer: ColumnarBuffer,
    transformer: RowTransformer,
    results: Option<mpsc::Sender<Page>>,
    errors: Option<mpsc::Sender<ConfluxError>>,
    token: CancellationToken,
}

impl Sink {
    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The token a producer races its blocking driver calls against.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cumulative counters of this read.
    pub fn stats(&self) -> PageStats {
        self.tracker.dump_stats(true)
    }

    pub async fn add_row(&mut self, row: &[Slot]) -> Result<()> {
        if self.state != SinkState::Operational {
            panic!(
                "{}",
                invariant_violation(format!("add_row called in state {:?}", self.state))
            );
        }

        self.limiter.add_row()?;

        if !self.tracker.try_add_row(row)? {
            self.flush(false).await?;
            if !self.tracker.try_add_row(row)? {
                panic!(
                    "{}",
                    invariant_violation("row does not fit into an empty page")
                );
            }
        }

        self.transformer
            .append_row(row, self.buffer.builders_mut())
            .map_err(|e| e.to_conflux_error(&self.table))?;
        self.buffer.add_row();
        Ok(())
    }

    /// Records a producer failure. Only the first error reaches the stream.
    pub fn add_error(&mut self, error: ConfluxError) {
        match self.state {
            SinkState::Operational => self.state = SinkState::Failed,
            SinkState::Failed => {}
            SinkState::Finished => panic!(
                "{}",
                invariant_violation("add_error called on a finished sink")
            ),
        }

        if let Some(errors) = &self.errors {
            if errors.try_send(error).is_err() {
                debug!(table = %self.table, "An earlier error is already pending, dropping this one");
            }
        }
    }

    /// Emits the last non-empty page as terminal and closes the result queue.
    pub async fn finish(&mut self) -> Result<()> {
        let result = match self.state {
            SinkState::Operational if !self.buffer.is_empty() => self.flush(true).await,
            SinkState::Operational | SinkState::Failed => Ok(()),
            SinkState::Finished => panic!(
                "{}",
                invariant_violation("finish called on a finished sink")
            ),
        };

        self.state = SinkState::Finished;
        self.results = None;
        self.errors = None;
        result
    }

    async fn flush(&mut self, is_terminal: bool) -> Result<()> {
        let batch = self.buffer.seal()?;
        let stats = self.tracker.dump_stats(false);
        self.tracker.refresh_counters();
        self.transformer.report_page();

        let Some(results) = &self.results else {
            panic!("{}", invariant_violation("flush without a result queue"));
        };

        let page = Page {
            batch,
            stats,
            is_terminal,
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(cancelled()),
            sent = results.send(page) => sent.map_err(|_| cancelled()),
        }
    }
}

fn cancelled() -> ConfluxError {
    ConfluxError::new(ErrorCode::StreamCancelled, "the result stream was cancelled")
}
