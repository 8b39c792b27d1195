use crate::error::Result;
use chrono::Utc;
use reelbase_model::JobStatus;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

/// The single-record durable status file.
///
/// Reads never fail the caller: an absent or unreadable file yields the idle
/// default so a disconnected observer always gets an answer. Writes replace
/// the whole file atomically (write-temp-then-rename).
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> JobStatus {
        match std::fs::read(&self.path) {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(status) => status,
                Err(e) => {
                    warn!(path = %self.path.display(), "unreadable status record: {e}");
                    JobStatus::idle()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => JobStatus::idle(),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read status record: {e}");
                JobStatus::idle()
            }
        }
    }

    pub fn write(&self, status: &JobStatus) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, status)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Append-only UTF-8 job log, one timestamped line per event.
///
/// Cleared only at the start of a run (by the controller); the detached job
/// process appends to the same file for the rest of the run.
#[derive(Debug, Clone)]
pub struct JobLog {
    path: PathBuf,
}

impl JobLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, level: &str, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{timestamp}] [{level}] {message}")?;
        file.flush()?;
        Ok(())
    }

    pub fn info(&self, message: &str) -> Result<()> {
        self.append("INFO", message)
    }

    pub fn error(&self, message: &str) -> Result<()> {
        self.append("ERROR", message)
    }

    /// Full accumulated text for the most recent run; `""` when absent.
    pub fn read_all(&self) -> String {
        std::fs::read_to_string(&self.path).unwrap_or_default()
    }

    pub fn clear(&self) -> Result<()> {
        std::fs::write(&self.path, b"")?;
        Ok(())
    }
}
