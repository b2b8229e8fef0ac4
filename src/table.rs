use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use camino::Utf8Path;

use crate::error::IngestError;
use crate::naming::to_snake_case;

/// A parsed CSV with canonical column names. Every cell is text; empty cells
/// are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

pub trait TableStore: Send + Sync {
    /// Replace the table `name` with the contents of `table`.
    fn materialize(&self, name: &str, table: &NormalizedTable) -> Result<(), IngestError>;
}

impl<T: TableStore + ?Sized> TableStore for Arc<T> {
    fn materialize(&self, name: &str, table: &NormalizedTable) -> Result<(), IngestError> {
        (**self).materialize(name, table)
    }
}

impl NormalizedTable {
    pub fn read_csv(path: &Utf8Path) -> Result<Self, IngestError> {
        let file = std::fs::File::open(path.as_std_path())
            .map_err(|err| IngestError::Filesystem(format!("open {path}: {err}")))?;
        Self::from_reader(file, path.file_name().unwrap_or(path.as_str()))
    }

    pub fn from_reader<R: Read>(reader: R, label: &str) -> Result<Self, IngestError> {
        let parse_err = |err: csv::Error| IngestError::CsvParse {
            file: label.to_string(),
            message: err.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = reader.headers().map_err(parse_err)?.clone();
        let columns = normalize_headers(headers.iter().map(str::to_string));
        if columns.is_empty() {
            return Err(IngestError::CsvParse {
                file: label.to_string(),
                message: "missing header row".to_string(),
            });
        }

        let mut rows = Vec::new();
        // StringRecord rejects invalid UTF-8 instead of substituting U+FFFD.
        let mut record = csv::StringRecord::new();
        while reader.read_record(&mut record).map_err(parse_err)? {
            if record.len() > columns.len() {
                let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                return Err(IngestError::CsvParse {
                    file: label.to_string(),
                    message: format!(
                        "line {line}: expected {} fields, found {}",
                        columns.len(),
                        record.len()
                    ),
                });
            }
            let mut row = record
                .iter()
                .map(|value| (!value.is_empty()).then(|| value.to_string()))
                .collect::<Vec<_>>();
            row.resize(columns.len(), None);
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Run every header through the normalizer. Headers that normalize to nothing
/// become `column_<n>`; repeats get `_2`, `_3`, ... suffixes.
pub fn normalize_headers<I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for (idx, header) in headers.into_iter().enumerate() {
        let trimmed = header.trim_start_matches('\u{feff}');
        let mut base = to_snake_case(trimmed);
        if base.is_empty() {
            base = format!("column_{}", idx + 1);
        }
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        columns.push(candidate);
    }
    columns
}
