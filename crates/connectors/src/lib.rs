//! Connector runtime for Conflux.
//!
//! Moves table data from an external store into Arrow pages:
//! - **Type bridge**: native column descriptors to canonical types (`type_mapping`).
//! - **Row pipeline**: typed acceptor slots and per-column appenders (`pipeline`).
//! - **Paging**: byte/row budgets, read limits and the page sink (`paging`).
//! - **Streaming**: producer/consumer orchestration of one split read (`streaming`).
//! - **Sources**: the data source contract and its relational implementation (`sources`).
//!
//! [`service::ConnectorService`] ties these together behind the
//! `DescribeTable`, `ListSplits` and `ReadSplits` entry points.
pub mod error;
pub mod paging;
pub mod pipeline;
pub mod service;
pub mod sources;
pub mod streaming;
pub mod type_mapping;

pub use error::ConversionError;
pub use service::{
    ConnectorService, DescribeTableRequest, DescribeTableResponse, ListSplitsRequest,
    ReadSplitsRequest, Split,
};
pub use sources::{DataSource, DataSourceCollection, ReadSplitRequest};
pub use streaming::{ReadSplitsResponse, ResponseWriter, StreamSummary, Streamer};
