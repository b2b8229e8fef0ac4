use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

pub const DEFAULT_CATALOG_URL: &str =
    "https://data.cms.gov/provider-data/api/1/metastore/schemas/dataset/items";
pub const DEFAULT_THEME: &str = "Hospitals";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_CONFIG_FILE: &str = "cms-ingest.json";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub catalog_url: String,
    pub theme: String,
    pub data_dir: Utf8PathBuf,
    pub database: Utf8PathBuf,
    pub concurrency: usize,
    pub request_timeout: Option<Duration>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit `path` must exist. Without one, `cms-ingest.json` in the
    /// working directory is read when present and defaults apply otherwise.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, IngestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| IngestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| IngestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, IngestError> {
        let theme = config.theme.unwrap_or_else(|| DEFAULT_THEME.to_string());
        if theme.trim().is_empty() {
            return Err(IngestError::InvalidConfig("theme must not be empty".to_string()));
        }

        let concurrency = match config.concurrency {
            Some(0) => {
                return Err(IngestError::InvalidConfig(
                    "concurrency must be at least 1".to_string(),
                ));
            }
            Some(value) => value,
            None => default_concurrency(),
        };

        let data_dir = Utf8PathBuf::from(
            config
                .data_dir
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );
        let database = config
            .database
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|| data_dir.join("cms_ingest.db"));

        Ok(ResolvedConfig {
            catalog_url: config
                .catalog_url
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            theme,
            data_dir,
            database,
            concurrency,
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
        })
    }
}

pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cms_hospitals() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.catalog_url, DEFAULT_CATALOG_URL);
        assert_eq!(resolved.theme, "Hospitals");
        assert_eq!(resolved.data_dir, Utf8PathBuf::from("data"));
        assert_eq!(resolved.database, Utf8PathBuf::from("data/cms_ingest.db"));
        assert!(resolved.concurrency >= 1);
        assert!(resolved.request_timeout.is_none());
    }
}
