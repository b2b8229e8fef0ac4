use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogItem {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub theme: Vec<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub distribution: Vec<Distribution>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Distribution {
    #[serde(default, rename = "downloadURL")]
    pub download_url: Option<String>,
}

impl CatalogItem {
    pub fn has_theme(&self, theme: &str) -> bool {
        self.theme.first().is_some_and(|first| first == theme)
    }
}

pub trait CatalogClient: Send + Sync {
    fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, IngestError>;
    fn download(&self, url: &str, destination: &Path) -> Result<(), IngestError>;
}

pub fn filter_by_theme(items: Vec<CatalogItem>, theme: &str) -> Vec<CatalogItem> {
    items
        .into_iter()
        .filter(|item| item.has_theme(theme))
        .collect()
}

pub fn parse_catalog(body: &str) -> Result<Vec<CatalogItem>, IngestError> {
    serde_json::from_str(body).map_err(|err| IngestError::CatalogParse(err.to_string()))
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    catalog_url: String,
}

impl CatalogHttpClient {
    pub fn new(catalog_url: &str, timeout: Option<Duration>) -> Result<Self, IngestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cms-ingest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| IngestError::CatalogHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| IngestError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            catalog_url: catalog_url.to_string(),
        })
    }
}

impl CatalogClient for CatalogHttpClient {
    fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, IngestError> {
        let response = self
            .client
            .get(&self.catalog_url)
            .send()
            .map_err(|err| IngestError::CatalogHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "catalog request failed".to_string());
            return Err(IngestError::CatalogStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| IngestError::CatalogHttp(err.to_string()))?;
        parse_catalog(&body)
    }

    fn download(&self, url: &str, destination: &Path) -> Result<(), IngestError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| IngestError::DownloadHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "download request failed".to_string());
            return Err(IngestError::DownloadStatus { status, message });
        }
        let mut file =
            File::create(destination).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| IngestError::DownloadHttp(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_theme_only() {
        let item = CatalogItem {
            theme: vec!["Nursing homes".to_string(), "Hospitals".to_string()],
            ..CatalogItem::default()
        };
        assert!(!item.has_theme("Hospitals"));
        assert!(item.has_theme("Nursing homes"));
    }

    #[test]
    fn missing_theme_never_matches() {
        assert!(!CatalogItem::default().has_theme("Hospitals"));
    }
}
