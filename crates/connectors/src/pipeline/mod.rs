//! Row pipeline: native driver values into columnar builders.
//!
//! For one query the output columns are bound once into an ordered list of
//! [`Slot`]s (what the driver scans into) and [`ColumnAppender`]s (what drains a
//! slot into its Arrow builder). Nothing is re-dispatched per row.

pub mod appender;
pub mod object_id;
pub mod slot;

pub use appender::{appender_for, AppendOutcome, Appender, ColumnAppender};
pub use slot::{Acceptors, Slot};

use crate::error::ConversionError;
use arrow::array::ArrayBuilder;
use conflux_sql::types::Column;
use tracing::warn;

/// Appends scanned rows into the builders of the current page.
pub struct RowTransformer {
    appenders: Vec<ColumnAppender>,
    out_of_bounds: u64,
}

impl RowTransformer {
    pub fn new(columns: &[Column]) -> Result<Self, ConversionError> {
        let appenders = columns
            .iter()
            .map(ColumnAppender::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            appenders,
            out_of_bounds: 0,
        })
    }

    /// Appends one row. Row-count-only reads have no appenders and append nothing.
    pub fn append_row(
        &mut self,
        row: &[Slot],
        builders: &mut [Box<dyn ArrayBuilder>],
    ) -> Result<(), ConversionError> {
        if self.appenders.is_empty() {
            return Ok(());
        }
        if row.len() != self.appenders.len() || builders.len() != self.appenders.len() {
            return Err(ConversionError::BuilderMismatch("row width"));
        }

        for ((appender, slot), builder) in self
            .appenders
            .iter()
            .zip(row)
            .zip(builders.iter_mut())
        {
            if appender.append(slot, builder.as_mut())? == AppendOutcome::OutOfBounds {
                self.out_of_bounds += 1;
            }
        }
        Ok(())
    }

    /// Logs the out-of-bounds values seen since the last call and resets the count.
    pub fn report_page(&mut self) -> u64 {
        let count = std::mem::take(&mut self.out_of_bounds);
        if count > 0 {
            warn!(
                values = count,
                "Values outside the representable range were replaced with NULL"
            );
        }
        count
    }
}
