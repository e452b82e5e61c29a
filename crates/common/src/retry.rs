use crate::config::{BackoffSettings, RetryConfig};
use conflux_error::{ConfluxError, ErrorCode, ErrorContext};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Decides whether a failed attempt may be re-attempted.
pub type ErrorChecker = fn(&ConfluxError) -> bool;

const TRANSIENT_MARKERS: &[&str] = &[
    "i/o timeout",
    "deadline exceeded",
    "connection refused",
    "connection reset",
    "timed out",
    "server misbehaving",
    "temporary failure in name resolution",
    "try again",
];

fn has_transient_marker(err: &ConfluxError) -> bool {
    let message = err.message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
}

/// Retriable failures while establishing a connection.
pub fn error_checker_make_connection_common(err: &ConfluxError) -> bool {
    err.is_retriable() || err.code == ErrorCode::ConnectionTimeout || has_transient_marker(err)
}

/// Retriable failures while issuing a query on an open connection.
pub fn error_checker_query_common(err: &ConfluxError) -> bool {
    err.is_retriable() || has_transient_marker(err)
}

/// Never retry.
pub fn error_checker_none(_err: &ConfluxError) -> bool {
    false
}

/// Exponential backoff state for a single retried operation.
#[derive(Debug)]
pub struct Backoff {
    settings: BackoffSettings,
    current: Duration,
    started: Instant,
}

impl Backoff {
    pub fn new(settings: BackoffSettings) -> Self {
        Self {
            current: settings.initial_interval(),
            started: Instant::now(),
            settings,
        }
    }

    /// Delay before the next attempt, or `None` once the elapsed-time ceiling would be crossed.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = randomize(self.current, self.settings.randomization_factor);
        if self.started.elapsed() + delay > self.settings.max_elapsed_time() {
            return None;
        }

        let grown = Duration::from_nanos(
            (self.current.as_nanos() as f64 * self.settings.multiplier) as u64,
        );
        self.current = grown.min(self.settings.max_interval());
        Some(delay)
    }
}

fn randomize(interval: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return interval;
    }
    let delta = interval.as_secs_f64() * factor;
    let low = interval.as_secs_f64() - delta;
    let jitter = rand::random::<f64>() * (2.0 * delta);
    Duration::from_secs_f64((low + jitter).max(0.0))
}

/// Runs an operation under a backoff policy, re-attempting only the failures
/// its checker accepts.
#[derive(Debug, Clone, Copy)]
pub struct Retrier {
    settings: BackoffSettings,
    checker: ErrorChecker,
}

impl Retrier {
    pub fn new(settings: BackoffSettings, checker: ErrorChecker) -> Self {
        Self { settings, checker }
    }

    /// Exactly one attempt.
    pub fn noop() -> Self {
        Self::new(BackoffSettings::disabled(), error_checker_none)
    }

    /// Non-retriable errors are returned unchanged. When retries run out the last
    /// error is reported as a permanent backend failure.
    pub async fn run<T, F, Fut>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, ConfluxError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ConfluxError>>,
    {
        let mut backoff = Backoff::new(self.settings);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if !(self.checker)(&err) {
                return Err(err);
            }

            match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        "Operation '{}' failed. Retrying in {:?} (attempt {}): {}",
                        operation_name, delay, attempt, err
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(
                        "Operation '{}' failed after {} attempts: {}",
                        operation_name, attempt, err
                    );
                    let mut exhausted = ConfluxError::new(
                        ErrorCode::PermanentBackendError,
                        format!("retries exhausted after {} attempts: {}", attempt, err.message),
                    );
                    exhausted.context = err.context.or_else(|| {
                        Some(ErrorContext::Connection {
                            source_kind: operation_name.to_string(),
                            host: None,
                            port: None,
                            attempts: Some(attempt),
                        })
                    });
                    return Err(exhausted);
                }
            }
        }
    }
}

/// The two retry policies a relational data source uses.
#[derive(Debug, Clone, Copy)]
pub struct RetrierSet {
    pub make_connection: Retrier,
    pub query: Retrier,
}

impl RetrierSet {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            make_connection: Retrier::new(
                config.make_connection,
                error_checker_make_connection_common,
            ),
            query: Retrier::new(config.query, error_checker_query_common),
        }
    }

    pub fn noop() -> Self {
        Self {
            make_connection: Retrier::noop(),
            query: Retrier::noop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_settings(max_elapsed_time_ms: u64) -> BackoffSettings {
        BackoffSettings {
            initial_interval_ms: 1,
            max_interval_ms: 4,
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed_time_ms,
        }
    }

    #[test]
    fn test_backoff_grows_until_max_interval() {
        let mut backoff = Backoff::new(BackoffSettings {
            max_elapsed_time_ms: 60_000,
            ..fast_settings(0)
        });
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().unwrap()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1),
                Duration::from_millis(2),
                Duration::from_millis(4),
                Duration::from_millis(4),
                Duration::from_millis(4),
            ]
        );
    }

    #[test]
    fn test_disabled_backoff_never_yields() {
        let mut backoff = Backoff::new(BackoffSettings::disabled());
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_randomize_stays_in_range() {
        for _ in 0..100 {
            let d = randomize(Duration::from_millis(1000), 0.25);
            assert!(d >= Duration::from_millis(750) && d <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_error_checkers() {
        let timeout = ConfluxError::new(ErrorCode::ConnectionTimeout, "open");
        assert!(error_checker_make_connection_common(&timeout));
        assert!(!error_checker_query_common(&timeout));

        let dns = ConfluxError::new(
            ErrorCode::PermanentBackendError,
            "lookup db: Temporary failure in name resolution",
        );
        assert!(error_checker_query_common(&dns));

        let syntax = ConfluxError::new(ErrorCode::PermanentBackendError, "syntax error at or near");
        assert!(!error_checker_query_common(&syntax));
    }

    #[tokio::test]
    async fn test_retrier_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let retrier = Retrier::new(fast_settings(5_000), error_checker_query_common);

        let result = retrier
            .run("query", move || async move {
                let calls = counter;
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ConfluxError::new(ErrorCode::RetriableConnectionError, "reset"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrier_returns_non_retriable_unchanged() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let retrier = Retrier::new(fast_settings(5_000), error_checker_query_common);

        let err = retrier
            .run("query", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ConfluxError::new(ErrorCode::TableNotFound, "no such table"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::TableNotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retrier_exhaustion_is_permanent() {
        let retrier = Retrier::new(BackoffSettings::disabled(), error_checker_query_common);

        let err = retrier
            .run("query", || async {
                Err::<(), _>(ConfluxError::new(ErrorCode::RetriableConnectionError, "refused"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::PermanentBackendError);
        assert!(err.message.contains("retries exhausted after 1 attempts"));
    }
}
