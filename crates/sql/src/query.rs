//! SELECT statement assembly for one split read.

use crate::args::QueryArgs;
use crate::error::PushdownError;
use crate::expr::Predicate;
use crate::formatter::SqlFormatter;
use crate::predicate::{compile, FilteringMode};
use crate::types::{CanonicalType, Column};
use serde::{Deserialize, Serialize};

/// What to read: a table, the requested columns in output order and an optional filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub what: Vec<Column>,
    pub filter: Option<Predicate>,
}

/// Which slice of the table a split covers. Serialized into the opaque split payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitDescription {
    /// The whole table.
    #[default]
    Single,
    /// Rows whose integer primary key lies in `[lower, upper)`. A missing bound is open.
    HistogramBounds {
        column: String,
        lower: Option<i64>,
        upper: Option<i64>,
    },
}

impl SplitDescription {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// An empty payload reads the whole table.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(SplitDescription::Single);
        }
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQueryParts {
    pub select_clause: String,
    pub from_clause: String,
    pub where_clause: Option<String>,
}

impl SelectQueryParts {
    pub fn render_default(&self) -> String {
        let mut text = format!("SELECT {} FROM {}", self.select_clause, self.from_clause);
        if let Some(where_clause) = &self.where_clause {
            text.push_str(" WHERE ");
            text.push_str(where_clause);
        }
        text
    }
}

/// A statement ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadSplitsQuery {
    pub text: String,
    pub args: QueryArgs,
    /// Columns the driver will return, in order.
    pub scan_columns: Vec<Column>,
    /// Columns sent to the client. Empty for row-count-only reads.
    pub output_columns: Vec<Column>,
}

/// Renders `SELECT <columns> FROM <table>` and returns the columns the statement yields.
///
/// An empty column set selects the constant `0`, scanned as a nameless `Int64`.
pub fn format_select_head(
    formatter: &dyn SqlFormatter,
    what: &[Column],
    table: &str,
) -> Result<(SelectQueryParts, Vec<Column>), PushdownError> {
    if table.is_empty() {
        return Err(PushdownError::EmptyTableName);
    }

    let (select_clause, scan_columns) = if what.is_empty() {
        ("0".to_string(), vec![Column::new("", CanonicalType::Int64)])
    } else {
        let names: Vec<String> = what
            .iter()
            .map(|c| formatter.sanitise_identifier(&c.name))
            .collect();
        (names.join(", "), what.to_vec())
    };

    Ok((
        SelectQueryParts {
            select_clause,
            from_clause: formatter.format_from(table),
            where_clause: None,
        },
        scan_columns,
    ))
}

pub fn make_read_splits_query(
    formatter: &dyn SqlFormatter,
    select: &Select,
    split: &SplitDescription,
    filtering: FilteringMode,
) -> Result<ReadSplitsQuery, PushdownError> {
    let (mut parts, scan_columns) = format_select_head(formatter, &select.what, &select.table)
        .map_err(|e| e.context("format select head"))?;

    let mut args = QueryArgs::new();
    if let Some(filter) = &select.filter {
        if let Some(compiled) =
            compile(filter, formatter, filtering).map_err(|e| e.context("format where clause"))?
        {
            parts.where_clause = Some(compiled.text);
            args = compiled.args;
        }
    }

    let text = formatter
        .render_select_query_text(&parts, split)
        .map_err(|e| e.context("render query text"))?;

    Ok(ReadSplitsQuery {
        text,
        args,
        scan_columns,
        output_columns: select.what.clone(),
    })
}
