//! Worker-wide namespace prefix table.
//!
//! The registry starts uninitialized. The first successful `init` seeds the
//! built-in prefixes, overlays the supplied mappings and publishes the
//! table; every later `init` is ignored until `clear`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::store::RemoteObjectStore;

/// Prefix to namespace URI
pub type NamespaceMappings = BTreeMap<String, String>;

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
pub const XML_SCHEMA_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XPATH_FUNCTIONS_NAMESPACE: &str = "http://www.w3.org/2005/xpath-functions";

/// The prefixes every table starts from: `xml`, `xs` and `fn`
pub fn default_mappings() -> NamespaceMappings {
    [
        ("xml", XML_NAMESPACE),
        ("xs", XML_SCHEMA_NAMESPACE),
        ("fn", XPATH_FUNCTIONS_NAMESPACE),
    ]
    .into_iter()
    .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
    .collect()
}

/// Parse a `prefix=uri` table, one mapping per line.
///
/// Blank lines and `#` comments are skipped. The split happens at the first
/// `=`, so URIs may contain `=`. Later lines override earlier ones.
pub fn parse_mappings(text: &str) -> Result<NamespaceMappings> {
    let mut mappings = NamespaceMappings::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((prefix, uri)) = line.split_once('=') else {
            return Err(Error::NamespaceParse {
                line: index + 1,
                message: format!("expected prefix=uri, found {:?}", line),
            });
        };
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(Error::NamespaceParse {
                line: index + 1,
                message: "empty prefix".to_string(),
            });
        }
        mappings.insert(prefix.to_string(), uri.trim().to_string());
    }
    Ok(mappings)
}

/// Lazily populated prefix to URI table shared by a worker
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    table: RwLock<Option<Arc<NamespaceMappings>>>,
    init_lock: Mutex<()>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The published table, `None` until initialized
    pub fn mappings(&self) -> Option<Arc<NamespaceMappings>> {
        self.table.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.mappings().is_some()
    }

    /// Publish defaults overlaid with `mappings`.
    ///
    /// Returns `true` for the call that initialized the registry. Later
    /// calls leave the table untouched and return `false`.
    pub fn init(&self, mappings: NamespaceMappings) -> bool {
        if self.is_initialized() {
            debug!(ignored = mappings.len(), "namespace registry already initialized, mappings ignored");
            return false;
        }
        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_initialized() {
            debug!(ignored = mappings.len(), "namespace registry already initialized, mappings ignored");
            return false;
        }
        self.publish(mappings);
        true
    }

    /// Load the table from `bucket`/`key` unless already initialized.
    ///
    /// Racing callers fetch and parse at most once.
    pub fn init_from_store(&self, store: &RemoteObjectStore, bucket: &str, key: &str) -> Result<bool> {
        if self.is_initialized() {
            debug!(bucket, key, "namespace registry already initialized");
            return Ok(false);
        }
        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_initialized() {
            debug!(bucket, key, "namespace registry already initialized");
            return Ok(false);
        }
        let text = store.get(bucket, key)?;
        let mappings = parse_mappings(&text)?;
        info!(bucket, key, "loaded namespace table");
        self.publish(mappings);
        Ok(true)
    }

    // caller holds init_lock
    fn publish(&self, mappings: NamespaceMappings) {
        let mut table = default_mappings();
        table.extend(mappings);
        for (prefix, uri) in &table {
            info!(prefix = %prefix, uri = %uri, "namespace");
        }
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(table));
    }

    /// Namespace URI bound to `prefix`; unknown prefixes map to `""`
    pub fn resolve(&self, prefix: &str) -> Result<String> {
        if prefix.is_empty() {
            return Err(Error::InvalidArgument("namespace prefix must not be empty".to_string()));
        }
        let table = self.mappings().ok_or(Error::NamespacesNotInitialized)?;
        Ok(table.get(prefix).cloned().unwrap_or_default())
    }

    /// Back to uninitialized; idempotent
    pub fn clear(&self) {
        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.table.write().unwrap_or_else(|e| e.into_inner()).take().is_some() {
            debug!("namespace registry cleared");
        }
    }
}
