//! Streaming orchestrator for one split read.
//!
//! A producer task drives the data source into a [`Sink`](crate::paging::Sink);
//! the calling task drains the result queue and writes every page to the
//! client. Both sides share one child cancellation token. Shutdown is always
//! cancel, then drain, then join.

use crate::paging::{encode_batch, Page, PageStats, ReadLimiter, SinkFactory};
use crate::sources::{DataSource, ReadSplitRequest};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use conflux_common::config::PagingConfig;
use conflux_common::warnings::collect_warnings;
use conflux_error::{ConfluxError, ErrorCode, Result, StatusCode};
use conflux_sql::types::{to_arrow_schema, Column};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One message of a `ReadSplits` response stream.
#[derive(Debug, Clone)]
pub struct ReadSplitsResponse {
    pub status: StatusCode,
    pub error: Option<ConfluxError>,
    /// Arrow IPC stream holding the schema and at most one batch.
    pub arrow_ipc: Vec<u8>,
    pub stats: PageStats,
    pub is_terminal: bool,
}

impl ReadSplitsResponse {
    fn page(page: &Page) -> Result<Self> {
        Ok(Self {
            status: StatusCode::Success,
            error: None,
            arrow_ipc: page.encode_ipc()?,
            stats: page.stats,
            is_terminal: page.is_terminal,
        })
    }

    fn empty_terminal(columns: &[Column]) -> Result<Self> {
        let batch = RecordBatch::new_empty(Arc::new(to_arrow_schema(columns)));
        Ok(Self {
            status: StatusCode::Success,
            error: None,
            arrow_ipc: encode_batch(&batch)?,
            stats: PageStats::default(),
            is_terminal: true,
        })
    }

    fn failure(error: &ConfluxError) -> Self {
        Self {
            status: error.status(),
            error: Some(error.clone()),
            arrow_ipc: Vec::new(),
            stats: PageStats::default(),
            is_terminal: true,
        }
    }
}

/// The network side of a response stream.
#[async_trait]
pub trait ResponseWriter: Send {
    async fn send(&mut self, response: ReadSplitsResponse) -> Result<()>;
}

/// What a finished stream delivered.
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub stats: PageStats,
    pub pages: usize,
    /// Filter clauses the backend could not evaluate.
    pub warnings: Vec<String>,
}

pub struct Streamer {
    source: Arc<dyn DataSource>,
    request: ReadSplitRequest,
    paging: PagingConfig,
    limiter: Box<dyn ReadLimiter>,
    token: CancellationToken,
}

impl Streamer {
    pub fn new(
        source: Arc<dyn DataSource>,
        request: ReadSplitRequest,
        paging: PagingConfig,
        limiter: Box<dyn ReadLimiter>,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            source,
            request,
            paging,
            limiter,
            token: parent.child_token(),
        }
    }

    pub async fn run(self, writer: &mut dyn ResponseWriter) -> Result<StreamSummary> {
        let Streamer {
            source,
            request,
            paging,
            limiter,
            token,
        } = self;
        let output_columns = request.select.what.clone();

        let (results_tx, mut results_rx) = mpsc::channel::<Page>(paging.prefetch_queue_capacity.max(1));
        let (errors_tx, mut errors_rx) = mpsc::channel::<ConfluxError>(1);

        let factory = SinkFactory::new(
            request.select.table.clone(),
            paging,
            limiter,
            results_tx,
            errors_tx.clone(),
            token.clone(),
        );

        let producer = tokio::spawn(async move {
            let (result, warnings) = collect_warnings(source.read_split(&request, factory)).await;
            if let Err(e) = result {
                if errors_tx.try_send(e).is_err() {
                    debug!("Producer error dropped, an earlier error is pending");
                }
            }
            warnings
        });

        let mut summary = StreamSummary::default();
        let mut errors_open = true;
        let mut terminal_written = false;
        let mut writer_failed = false;

        let outcome: Result<()> = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    break Err(ConfluxError::new(ErrorCode::StreamCancelled, "the read was cancelled"));
                }
                error = errors_rx.recv(), if errors_open => match error {
                    Some(e) => break Err(e),
                    None => errors_open = false,
                },
                page = results_rx.recv() => match page {
                    Some(page) => {
                        let response = match ReadSplitsResponse::page(&page) {
                            Ok(response) => response,
                            Err(e) => break Err(e),
                        };
                        if let Err(e) = writer.send(response).await {
                            writer_failed = true;
                            break Err(e);
                        }
                        summary.pages += 1;
                        summary.stats.rows += page.stats.rows;
                        summary.stats.bytes += page.stats.bytes;
                        terminal_written = page.is_terminal;
                    }
                    None => {
                        // The queue closes before the producer reports its own error.
                        if errors_open {
                            if let Some(e) = errors_rx.recv().await {
                                break Err(e);
                            }
                        }
                        break Ok(());
                    }
                },
            }
        };

        let outcome = match outcome {
            Ok(()) if !terminal_written => {
                match ReadSplitsResponse::empty_terminal(&output_columns) {
                    Ok(response) => writer.send(response).await,
                    Err(e) => Err(e),
                }
            }
            Ok(()) => Ok(()),
            Err(e) => {
                if !writer_failed {
                    if let Err(send_error) = writer.send(ReadSplitsResponse::failure(&e)).await {
                        warn!(error = %send_error, "Failed to write the terminal error message");
                    }
                }
                Err(e)
            }
        };

        // cancel → drain → join
        token.cancel();
        results_rx.close();
        while results_rx.try_recv().is_ok() {}
        drop(errors_rx);

        match producer.await {
            Ok(warnings) => summary.warnings = warnings,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => warn!(error = %e, "Producer task did not complete"),
        }

        outcome.map(|()| summary)
    }
}
