use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use super::metrics::RequestOutcome;
use crate::error::ScraperError;

#[derive(Serialize)]
struct SinkLine<'a> {
    logged_at: String,
    metrics: &'a RequestOutcome,
}

/// Append-only JSON Lines file, one line per recorded outcome.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::MonitorSink`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ScraperError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ScraperError::MonitorSink {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one outcome and flushes. Failures are logged and swallowed.
    pub fn append(&mut self, outcome: &RequestOutcome) {
        let line = SinkLine {
            logged_at: Utc::now().to_rfc3339(),
            metrics: outcome,
        };
        let result = serde_json::to_writer(&mut self.writer, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush());
        if let Err(e) = result {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "failed to write monitor log line"
            );
        }
    }
}
