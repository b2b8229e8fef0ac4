use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;
use crate::error::IngestError;
use crate::naming::to_snake_case;

const MODIFIED_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModifiedDate(NaiveDate);

impl ModifiedDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn as_date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for ModifiedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(MODIFIED_FORMAT))
    }
}

impl FromStr for ModifiedDate {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(value.trim(), MODIFIED_FORMAT)
            .map(Self)
            .map_err(|_| IngestError::InvalidModifiedDate(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileName(String);

impl FileName {
    pub fn from_url(url: &Url) -> Result<Self, IngestError> {
        let basename = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        if basename.is_empty() || basename == "." || basename == ".." || basename.contains('\\')
        {
            return Err(IngestError::InvalidDownloadUrl(url.to_string()));
        }
        Ok(Self(basename.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the materialized table: the file stem run through the normalizer.
    pub fn table_name(&self) -> String {
        let stem = match self.0.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem,
            _ => self.0.as_str(),
        };
        let name = to_snake_case(stem);
        if name.is_empty() {
            "dataset".to_string()
        } else {
            name
        }
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog item reduced to what the ingestion worker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub identifier: Option<String>,
    pub title: Option<String>,
    /// `downloadURL` exactly as the catalog lists it, minus surrounding
    /// whitespace. This is what gets downloaded and logged.
    pub download_url: String,
    pub url: Url,
    pub file_name: FileName,
    pub modified: ModifiedDate,
}

impl TryFrom<&CatalogItem> for DatasetDescriptor {
    type Error = IngestError;

    fn try_from(item: &CatalogItem) -> Result<Self, Self::Error> {
        let raw_url = item
            .distribution
            .first()
            .and_then(|distribution| distribution.download_url.as_deref())
            .ok_or_else(|| IngestError::MissingField("distribution[0].downloadURL".to_string()))?
            .trim();
        let url = Url::parse(raw_url)
            .map_err(|_| IngestError::InvalidDownloadUrl(raw_url.to_string()))?;
        let file_name = FileName::from_url(&url)?;
        let modified = item
            .modified
            .as_deref()
            .ok_or_else(|| IngestError::MissingField("modified".to_string()))?
            .parse()?;

        Ok(Self {
            identifier: item.identifier.clone(),
            title: item.title.clone(),
            download_url: raw_url.to_string(),
            url,
            file_name,
            modified,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestOutcome {
    Skipped,
    Ingested { table: String, rows: usize },
    Failed { reason: String },
}

impl IngestOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Skipped => "skipped",
            IngestOutcome::Ingested { .. } => "ingested",
            IngestOutcome::Failed { .. } => "failed",
        }
    }
}
