//! Pushdown core for Conflux.
//!
//! This crate turns backend-agnostic filter trees into something a backend can run:
//! - **SQL dialects**: PostgreSQL, ClickHouse and MySQL through [`SqlFormatter`].
//! - **Document filters**: MongoDB-style query documents (via `document`).
//!
//! It also owns the canonical type system shared by every connector.
pub mod args;
pub mod decimal;
pub mod dialects;
pub mod document;
pub mod error;
pub mod expr;
pub mod formatter;
pub mod predicate;
pub mod query;
pub mod types;

pub use args::{ArgValue, QueryArg, QueryArgs};
pub use error::PushdownError;
pub use expr::{Expression, Predicate};
pub use formatter::SqlFormatter;
pub use predicate::{compile, compile_predicate, CompiledPredicate, FilteringMode};
pub use query::{make_read_splits_query, ReadSplitsQuery, Select, SplitDescription};
pub use types::{CanonicalType, Column};
