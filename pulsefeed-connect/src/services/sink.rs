//! Newline-delimited JSON output sink

use crate::error::FetchResult;
use crate::models::TaggedRecord;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes tagged records as one compact JSON object per line
pub struct NdjsonSink {
    path: PathBuf,
}

impl NdjsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all records, replacing any existing file; returns the line count
    pub fn write(&self, records: &[TaggedRecord]) -> FetchResult<usize> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = fs::File::create(&self.path)?;
        let mut writer = BufWriter::new(file);

        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }

        writer.flush()?;

        tracing::info!(
            path = %self.path.display(),
            lines = records.len(),
            "Wrote NDJSON output"
        );

        Ok(records.len())
    }
}
