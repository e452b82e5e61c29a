use super::traffic::PageStats;
use arrow::array::{make_builder, ArrayBuilder, ArrayRef};
use arrow::datatypes::SchemaRef;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use conflux_error::Result;
use conflux_sql::types::{to_arrow_schema, Column};
use std::sync::Arc;

const INITIAL_CAPACITY: usize = 1024;

/// In-progress columnar arrays of one page.
///
/// A read with no output columns keeps only a row counter and seals into a
/// zero-column batch carrying the row count.
pub struct ColumnarBuffer {
    schema: SchemaRef,
    builders: Vec<Box<dyn ArrayBuilder>>,
    rows: usize,
}

impl ColumnarBuffer {
    pub fn new(columns: &[Column]) -> Self {
        let schema = Arc::new(to_arrow_schema(columns));
        let builders = schema
            .fields()
            .iter()
            .map(|f| make_builder(f.data_type(), INITIAL_CAPACITY))
            .collect();
        Self {
            schema,
            builders,
            rows: 0,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn builders_mut(&mut self) -> &mut [Box<dyn ArrayBuilder>] {
        &mut self.builders
    }

    pub fn add_row(&mut self) {
        self.rows += 1;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Finishes every builder into a batch and starts over with empty builders.
    pub fn seal(&mut self) -> Result<RecordBatch> {
        let arrays: Vec<ArrayRef> = self.builders.iter_mut().map(|b| b.finish()).collect();
        let rows = std::mem::take(&mut self.rows);
        let batch = if arrays.is_empty() {
            RecordBatch::try_new_with_options(
                self.schema.clone(),
                arrays,
                &RecordBatchOptions::new().with_row_count(Some(rows)),
            )?
        } else {
            RecordBatch::try_new(self.schema.clone(), arrays)?
        };
        Ok(batch)
    }
}

/// One sealed page. Owned by whoever received it; the producer never touches it again.
#[derive(Debug, Clone)]
pub struct Page {
    pub batch: RecordBatch,
    pub stats: PageStats,
    pub is_terminal: bool,
}

impl Page {
    /// Arrow IPC stream: the schema followed by this page's batch.
    pub fn encode_ipc(&self) -> Result<Vec<u8>> {
        encode_batch(&self.batch)
    }
}

pub fn encode_batch(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut writer = StreamWriter::try_new(Vec::new(), &batch.schema())?;
    writer.write(batch)?;
    writer.finish()?;
    Ok(writer.into_inner()?)
}
