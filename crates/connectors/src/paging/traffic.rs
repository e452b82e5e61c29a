use super::size_pattern::SizePattern;
use crate::pipeline::Slot;
use conflux_common::config::PagingConfig;
use conflux_error::{ConfluxError, ErrorCode, ErrorContext, Result};
use serde::Serialize;

/// Row and byte counters of one page, or of the whole read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageStats {
    pub rows: u64,
    pub bytes: u64,
}

/// Decides whether the next row still fits the current page.
#[derive(Debug)]
pub struct TrafficTracker {
    config: PagingConfig,
    pattern: Option<SizePattern>,
    current: PageStats,
    total: PageStats,
}

impl TrafficTracker {
    pub fn new(config: PagingConfig) -> Self {
        Self {
            config,
            pattern: None,
            current: PageStats::default(),
            total: PageStats::default(),
        }
    }

    /// Accounts `row` against the current page.
    ///
    /// Returns `Ok(false)` without counting the row when it would overflow the
    /// page; the caller flushes and asks again. A row that could never fit any
    /// page is an error.
    pub fn try_add_row(&mut self, row: &[Slot]) -> Result<bool> {
        let bytes = self
            .pattern
            .get_or_insert_with(|| SizePattern::from_row(row))
            .estimate(row);

        let byte_budget = self.config.bytes_per_page;
        if byte_budget > 0 {
            if bytes > byte_budget {
                return Err(ConfluxError::new(
                    ErrorCode::PageSizeExceeded,
                    format!(
                        "row of {} bytes exceeds the page budget of {} bytes",
                        bytes, byte_budget
                    ),
                )
                .with_context(ErrorContext::PageBudget {
                    row_bytes: bytes,
                    bytes_per_page: byte_budget,
                })
                .with_hint("Raise paging.bytes_per_page"));
            }
            if self.current.bytes + bytes > byte_budget {
                return Ok(false);
            }
        }

        let row_budget = self.config.rows_per_page;
        if row_budget > 0 && self.current.rows + 1 > row_budget {
            return Ok(false);
        }

        self.current.rows += 1;
        self.current.bytes += bytes;
        Ok(true)
    }

    /// Folds the current page into the totals and starts a new page.
    pub fn refresh_counters(&mut self) {
        self.total.rows += self.current.rows;
        self.total.bytes += self.current.bytes;
        self.current = PageStats::default();
    }

    /// Counters of the current page, or of everything so far when `total` is set.
    pub fn dump_stats(&self, total: bool) -> PageStats {
        if total {
            PageStats {
                rows: self.total.rows + self.current.rows,
                bytes: self.total.bytes + self.current.bytes,
            }
        } else {
            self.current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rows_per_page: u64, bytes_per_page: u64) -> PagingConfig {
        PagingConfig {
            rows_per_page,
            bytes_per_page,
            prefetch_queue_capacity: 1,
        }
    }

    fn row(text: &str) -> Vec<Slot> {
        vec![Slot::Int(Some(1)), Slot::Text(Some(text.to_string()))]
    }

    #[test]
    fn test_row_budget() {
        let mut tracker = TrafficTracker::new(config(2, 0));
        assert!(tracker.try_add_row(&row("a")).unwrap());
        assert!(tracker.try_add_row(&row("a")).unwrap());
        assert!(!tracker.try_add_row(&row("a")).unwrap());
        assert_eq!(tracker.dump_stats(false).rows, 2);

        tracker.refresh_counters();
        assert!(tracker.try_add_row(&row("a")).unwrap());
        assert_eq!(tracker.dump_stats(false).rows, 1);
        assert_eq!(tracker.dump_stats(true).rows, 3);
    }

    #[test]
    fn test_byte_budget() {
        // 8 fixed bytes plus the text length.
        let mut tracker = TrafficTracker::new(config(0, 20));
        assert!(tracker.try_add_row(&row("abc")).unwrap());
        assert!(!tracker.try_add_row(&row("abcdef")).unwrap());
        assert_eq!(tracker.dump_stats(false).bytes, 11);
    }

    #[test]
    fn test_oversized_row() {
        let mut tracker = TrafficTracker::new(config(0, 10));
        let err = tracker.try_add_row(&row("abcdefgh")).unwrap_err();
        assert_eq!(err.code, ErrorCode::PageSizeExceeded);
        assert!(matches!(
            err.context,
            Some(ErrorContext::PageBudget {
                row_bytes: 16,
                bytes_per_page: 10
            })
        ));
    }

    #[test]
    fn test_unbounded() {
        let mut tracker = TrafficTracker::new(config(0, 0));
        for _ in 0..1000 {
            assert!(tracker.try_add_row(&row("some text")).unwrap());
        }
    }
}
