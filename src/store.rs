use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, NamedTempFile};

use crate::domain::FileName;
use crate::error::IngestError;

/// Working directory holding downloaded CSV artifacts.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: Utf8PathBuf,
}

impl Store {
    pub fn new(data_dir: Utf8PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Utf8Path {
        &self.data_dir
    }

    pub fn csv_path(&self, file_name: &FileName) -> Utf8PathBuf {
        self.data_dir.join(file_name.as_str())
    }

    pub fn ensure_data_dir(&self) -> Result<(), IngestError> {
        fs::create_dir_all(self.data_dir.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))
    }

    /// Scratch file next to the final artifact so that `persist` is a rename
    /// on the same filesystem.
    pub fn staging_file(&self) -> Result<NamedTempFile, IngestError> {
        self.ensure_data_dir()?;
        Builder::new()
            .prefix(".cms-ingest")
            .suffix(".part")
            .tempfile_in(self.data_dir.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))
    }

    /// Rename a finished download over `dest`. The previous version stays in
    /// place until the rename succeeds.
    pub fn persist(temp: NamedTempFile, dest: &Utf8Path) -> Result<(), IngestError> {
        temp.persist(dest.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
