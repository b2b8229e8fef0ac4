use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::{FileName, ModifiedDate};
use crate::error::IngestError;

pub const LOG_TABLE: &str = "job_log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunLogEntry {
    pub file_name: String,
    pub url: String,
    pub download_timestamp: NaiveDateTime,
    pub modified_date: ModifiedDate,
}

/// Append-only history of ingested files.
pub trait RunLog: Send + Sync {
    fn ensure_schema(&self) -> Result<(), IngestError>;
    /// All entries, oldest first.
    fn read_all(&self) -> Result<Vec<RunLogEntry>, IngestError>;
    fn append(&self, entry: &RunLogEntry) -> Result<(), IngestError>;
}

impl<T: RunLog + ?Sized> RunLog for Arc<T> {
    fn ensure_schema(&self) -> Result<(), IngestError> {
        (**self).ensure_schema()
    }

    fn read_all(&self) -> Result<Vec<RunLogEntry>, IngestError> {
        (**self).read_all()
    }

    fn append(&self, entry: &RunLogEntry) -> Result<(), IngestError> {
        (**self).append(entry)
    }
}

/// The most recently appended entry for `file_name`.
pub fn latest_entry<'a>(
    entries: &'a [RunLogEntry],
    file_name: &FileName,
) -> Option<&'a RunLogEntry> {
    entries
        .iter()
        .rev()
        .find(|entry| entry.file_name == file_name.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDecision {
    New,
    Modified { previous: ModifiedDate },
    Unchanged,
}

impl ChangeDecision {
    pub fn evaluate(latest: Option<&RunLogEntry>, current: ModifiedDate) -> Self {
        match latest {
            None => ChangeDecision::New,
            Some(entry) if entry.modified_date != current => ChangeDecision::Modified {
                previous: entry.modified_date,
            },
            Some(_) => ChangeDecision::Unchanged,
        }
    }

    pub fn needs_download(&self) -> bool {
        !matches!(self, ChangeDecision::Unchanged)
    }
}
