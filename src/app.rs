use std::time::Instant;

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogClient, CatalogItem, filter_by_theme};
use crate::domain::{DatasetDescriptor, IngestOutcome};
use crate::error::IngestError;
use crate::log_store::{ChangeDecision, RunLog, RunLogEntry, latest_entry};
use crate::store::Store;
use crate::table::{NormalizedTable, TableStore};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub theme: String,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub url: Option<String>,
    pub modified: Option<String>,
    #[serde(flatten)]
    pub outcome: IngestOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub theme: String,
    pub catalog_items: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
    pub items: Vec<DatasetReport>,
}

impl RunSummary {
    fn from_reports(theme: &str, catalog_items: usize, items: Vec<DatasetReport>) -> Self {
        let (mut ingested, mut skipped, mut failed) = (0, 0, 0);
        for item in &items {
            match item.outcome {
                IngestOutcome::Ingested { .. } => ingested += 1,
                IngestOutcome::Skipped => skipped += 1,
                IngestOutcome::Failed { .. } => failed += 1,
            }
        }
        Self {
            theme: theme.to_string(),
            catalog_items,
            ingested,
            skipped,
            failed,
            items,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

pub struct App<C: CatalogClient, L: RunLog, T: TableStore> {
    store: Store,
    catalog: C,
    log: L,
    tables: T,
}

impl<C: CatalogClient, L: RunLog, T: TableStore> App<C, L, T> {
    pub fn new(store: Store, catalog: C, log: L, tables: T) -> Self {
        Self {
            store,
            catalog,
            log,
            tables,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn tables(&self) -> &T {
        &self.tables
    }

    /// Fetch the catalog once and ingest every matching dataset on a bounded
    /// pool. Only catalog and setup failures are returned as errors; dataset
    /// failures are reported per item.
    pub fn run(&self, options: &RunOptions) -> Result<RunSummary, IngestError> {
        self.log.ensure_schema()?;

        let start = Instant::now();
        let items = self.catalog.fetch_catalog()?;
        let catalog_items = items.len();
        let datasets = filter_by_theme(items, &options.theme);
        info!(
            theme = %options.theme,
            catalog_items,
            matched = datasets.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "catalog fetched"
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(options.concurrency.max(1))
            .thread_name(|idx| format!("cms-ingest-{idx}"))
            .build()
            .map_err(|err| IngestError::WorkerPool(err.to_string()))?;
        let reports = pool.install(|| {
            datasets
                .par_iter()
                .map(|item| self.ingest_dataset(item))
                .collect::<Vec<_>>()
        });

        let summary = RunSummary::from_reports(&options.theme, catalog_items, reports);
        info!(
            ingested = summary.ingested,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run finished"
        );
        Ok(summary)
    }

    /// Process one catalog item. Never fails; errors become
    /// [`IngestOutcome::Failed`].
    pub fn ingest_dataset(&self, item: &CatalogItem) -> DatasetReport {
        let dataset = match DatasetDescriptor::try_from(item) {
            Ok(dataset) => dataset,
            Err(err) => {
                warn!(
                    identifier = item.identifier.as_deref().unwrap_or("-"),
                    error = %err,
                    "dataset rejected"
                );
                return DatasetReport {
                    identifier: item.identifier.clone(),
                    title: item.title.clone(),
                    file_name: None,
                    url: None,
                    modified: item.modified.clone(),
                    outcome: IngestOutcome::Failed {
                        reason: err.to_string(),
                    },
                };
            }
        };

        let outcome = match self.ingest_resolved(&dataset) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    file_name = %dataset.file_name,
                    url = %dataset.download_url,
                    error = %err,
                    "dataset failed"
                );
                IngestOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        DatasetReport {
            identifier: dataset.identifier.clone(),
            title: dataset.title.clone(),
            file_name: Some(dataset.file_name.to_string()),
            url: Some(dataset.download_url.clone()),
            modified: Some(dataset.modified.to_string()),
            outcome,
        }
    }

    fn ingest_resolved(&self, dataset: &DatasetDescriptor) -> Result<IngestOutcome, IngestError> {
        let entries = self.log.read_all()?;
        let decision =
            ChangeDecision::evaluate(latest_entry(&entries, &dataset.file_name), dataset.modified);

        match &decision {
            ChangeDecision::Unchanged => {
                info!(
                    file_name = %dataset.file_name,
                    modified = %dataset.modified,
                    "dataset not modified, skipping download"
                );
                return Ok(IngestOutcome::Skipped);
            }
            ChangeDecision::Modified { previous } => {
                info!(
                    file_name = %dataset.file_name,
                    expected = %dataset.modified,
                    found = %previous,
                    "modified date changed"
                );
            }
            ChangeDecision::New => {
                info!(file_name = %dataset.file_name, "no previous download recorded");
            }
        }

        info!(url = %dataset.download_url, "downloading dataset");
        let start = Instant::now();
        let dest = self.store.csv_path(&dataset.file_name);
        let staging = self.store.staging_file()?;
        self.catalog.download(&dataset.download_url, staging.path())?;
        Store::persist(staging, &dest)?;

        let table = NormalizedTable::read_csv(&dest)?;
        let table_name = dataset.file_name.table_name();
        self.tables.materialize(&table_name, &table)?;

        self.log.append(&RunLogEntry {
            file_name: dataset.file_name.to_string(),
            url: dataset.download_url.clone(),
            download_timestamp: chrono::Utc::now().naive_utc(),
            modified_date: dataset.modified,
        })?;

        info!(
            file_name = %dataset.file_name,
            table = %table_name,
            rows = table.row_count(),
            latency_ms = start.elapsed().as_millis() as u64,
            "dataset ingested"
        );
        Ok(IngestOutcome::Ingested {
            table: table_name,
            rows: table.row_count(),
        })
    }
}
