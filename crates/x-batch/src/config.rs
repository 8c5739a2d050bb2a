//! Worker configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::credentials::Properties;
use crate::error::{Error, Result};
use crate::store::{HttpConnector, InMemoryObjectStore, MemoryConnector, ObjectLocation, StoreConnector};

pub const ENV_STORE_ENDPOINT: &str = "X_BATCH_STORE_ENDPOINT";
pub const ENV_LOG: &str = "X_BATCH_LOG";

/// Object store transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Http,
    #[default]
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Signing region for the http backend, `us-east-1` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Worker configuration, loaded from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub store: StoreConfig,
    /// Namespace table loaded by the per-partition init
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<ObjectLocation>,
    /// `key=value` file backing the credential fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties_file: Option<PathBuf>,
    pub log_filter: String,
    pub partitions: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            namespaces: None,
            properties_file: None,
            log_filter: "info".to_string(),
            partitions: 1,
        }
    }
}

impl WorkerConfig {
    /// Read a JSON file, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&text)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Override fields from `X_BATCH_STORE_ENDPOINT` and `X_BATCH_LOG`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(ENV_STORE_ENDPOINT).filter(|v| !v.is_empty()) {
            self.store.endpoint = Some(endpoint);
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log_filter = filter;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.partitions == 0 {
            return Err(Error::Config("partitions must be at least 1".to_string()));
        }
        if self.store.backend == StoreBackend::Http && self.store.endpoint.is_none() {
            return Err(Error::Config("http store backend requires an endpoint".to_string()));
        }
        if let Some(location) = &self.namespaces {
            if location.bucket.is_empty() || location.key.is_empty() {
                return Err(Error::Config(format!("incomplete namespace source {}", location)));
            }
        }
        Ok(())
    }

    /// Connector for the configured store backend
    pub fn connector(&self) -> Result<Arc<dyn StoreConnector>> {
        match self.store.backend {
            StoreBackend::Http => {
                let endpoint = self
                    .store
                    .endpoint
                    .clone()
                    .ok_or_else(|| Error::Config("http store backend requires an endpoint".to_string()))?;
                let connector = HttpConnector::new(endpoint);
                Ok(Arc::new(match &self.store.region {
                    Some(region) => connector.with_region(region.as_str()),
                    None => connector,
                }))
            }
            StoreBackend::Memory => Ok(Arc::new(MemoryConnector::new(Arc::new(InMemoryObjectStore::new())))),
        }
    }

    /// Property store, loaded from `properties_file` when set
    pub fn properties(&self) -> Result<Properties> {
        match &self.properties_file {
            Some(path) => Properties::load(path),
            None => Ok(Properties::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = WorkerConfig::from_json("{}").unwrap();
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.partitions, 1);
    }

    #[test]
    fn full_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "store": {{ "backend": "http", "endpoint": "http://localhost:9000", "region": "eu-west-1" }},
                "namespaces": {{ "bucket": "els-ats", "key": "Namespaces/SDNamespaceContext" }},
                "log_filter": "x_batch=debug",
                "partitions": 4
            }}"#
        )
        .unwrap();
        let mut config = WorkerConfig::from_json(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.store.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.store.region.as_deref(), Some("eu-west-1"));
        assert!(config.connector().is_ok());
        assert_eq!(
            config.namespaces,
            Some(ObjectLocation::new("els-ats", "Namespaces/SDNamespaceContext"))
        );

        config.apply_overrides(|name| match name {
            ENV_STORE_ENDPOINT => Some("http://store:9000".to_string()),
            _ => None,
        });
        assert_eq!(config.store.endpoint.as_deref(), Some("http://store:9000"));
        assert_eq!(config.log_filter, "x_batch=debug");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let config = WorkerConfig::from_json(r#"{ "partitions": 0 }"#).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = WorkerConfig::from_json(r#"{ "store": { "backend": "http" } }"#).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        assert!(matches!(
            WorkerConfig::from_json(r#"{ "store": { "backend": "ftp" } }"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn properties_file_feeds_the_property_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "AWS_ACCESS_KEY_ID=from-file").unwrap();
        let config = WorkerConfig {
            properties_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let properties = config.properties().unwrap();
        assert_eq!(properties.get("AWS_ACCESS_KEY_ID").as_deref(), Some("from-file"));
        assert!(config.connector().is_ok());
    }

    #[test]
    fn load_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            WorkerConfig::load(&dir.path().join("missing.json")),
            Err(Error::Io(_))
        ));
    }
}
