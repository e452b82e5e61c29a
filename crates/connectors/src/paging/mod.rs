//! Paging: bounded pages, row ceilings and the sink state machine that feeds
//! the result queue.

pub mod buffer;
pub mod read_limiter;
pub mod sink;
pub mod size_pattern;
pub mod traffic;

pub use buffer::{encode_batch, ColumnarBuffer, Page};
pub use read_limiter::{ReadLimiter, ReadLimiterFactory};
pub use sink::{Sink, SinkFactory, SinkState};
pub use size_pattern::SizePattern;
pub use traffic::{PageStats, TrafficTracker};
