use crate::pipeline::Slot;

/// Byte cost model of a row, derived once from the first scanned row.
///
/// Fixed-size columns are summed once. Variable-size columns are re-measured on
/// every row from their actual content length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizePattern {
    fixed_bytes: u64,
    variable: Vec<usize>,
}

impl SizePattern {
    pub fn from_row(row: &[Slot]) -> Self {
        let mut fixed_bytes = 0u64;
        let mut variable = Vec::new();
        for (i, slot) in row.iter().enumerate() {
            match slot.fixed_size() {
                Some(size) => fixed_bytes += size as u64,
                None => variable.push(i),
            }
        }
        Self {
            fixed_bytes,
            variable,
        }
    }

    /// Estimated bytes of `row`. The classification of the first row stays authoritative.
    pub fn estimate(&self, row: &[Slot]) -> u64 {
        let variable: u64 = self
            .variable
            .iter()
            .filter_map(|&i| row.get(i))
            .map(|slot| slot.variable_len().unwrap_or(0) as u64)
            .sum();
        self.fixed_bytes + variable
    }
}
