use super::ImportRecord;
use super::state_store::append_line;
use crate::Result;
use ohno::IntoAppError;
use std::path::PathBuf;

/// Destination for import records. Records are only ever appended.
pub trait RecordSink {
    fn append(&mut self, records: &[ImportRecord]) -> Result<()>;
}

/// Writes one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, records: &[ImportRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut block = String::new();
        for record in records {
            if !block.is_empty() {
                block.push('\n');
            }
            block.push_str(&serde_json::to_string(record).into_app_err("serializing import record")?);
        }

        append_line(&self.path, &block)
    }
}

impl RecordSink for Vec<ImportRecord> {
    fn append(&mut self, records: &[ImportRecord]) -> Result<()> {
        self.extend_from_slice(records);
        Ok(())
    }
}
