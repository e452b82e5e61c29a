//! Shared building blocks for the Conflux connector crates.
//!
//! - **Configuration**: paging budgets, backoff, pushdown switches and per-backend settings (`config`).
//! - **Models**: data source kinds and instance descriptors (`models`).
//! - **Resilience**: exponential backoff with retriable-error predicates (`retry`).
//! - **Logging**: subscriber initialisation (`telemetry`), argument redaction (`scrubber`)
//!   and task-local pushdown warnings (`warnings`).
pub mod config;
pub mod models;
pub mod retry;
pub mod scrubber;
pub mod telemetry;
pub mod warnings;
