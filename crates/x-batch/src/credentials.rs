//! Object store credentials.
//!
//! Credentials come from the process environment first and from the
//! worker's property store second. The property store plays the role of
//! process-level system properties: values set by the driver or loaded from
//! a `key=value` file.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::Result;

pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

/// In-process `key=value` property store
#[derive(Debug, Default)]
pub struct Properties {
    values: RwLock<HashMap<String, String>>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a properties file: `key=value` per line, `#` comments
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let properties = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                properties.set(key.trim(), value.trim());
            }
        }
        Ok(properties)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
    }
}

/// Access key pair for the object store
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves [`Credentials`]: environment variable, then property
pub struct CredentialResolver {
    env: EnvLookup,
    properties: Arc<Properties>,
}

impl CredentialResolver {
    pub fn new(properties: Arc<Properties>) -> Self {
        Self {
            env: Arc::new(|name| std::env::var(name).ok()),
            properties,
        }
    }

    /// Resolver that ignores the process environment
    pub fn properties_only(properties: Arc<Properties>) -> Self {
        Self {
            env: Arc::new(|_| None),
            properties,
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        (self.env)(name)
            .or_else(|| self.properties.get(name))
            .filter(|value| !value.is_empty())
    }

    /// Both keys, or `None` if either is missing
    pub fn resolve(&self) -> Option<Credentials> {
        Some(Credentials {
            access_key_id: self.lookup(AWS_ACCESS_KEY_ID)?,
            secret_access_key: self.lookup(AWS_SECRET_ACCESS_KEY)?,
        })
    }

    pub fn properties(&self) -> &Arc<Properties> {
        &self.properties
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn environment_takes_precedence_over_properties() {
        let properties = Arc::new(Properties::new());
        properties.set(AWS_ACCESS_KEY_ID, "from-props");
        properties.set(AWS_SECRET_ACCESS_KEY, "props-secret");
        let resolver = CredentialResolver {
            env: Arc::new(|name| (name == AWS_ACCESS_KEY_ID).then(|| "from-env".to_string())),
            properties,
        };
        let credentials = resolver.resolve().unwrap();
        assert_eq!(credentials.access_key_id, "from-env");
        assert_eq!(credentials.secret_access_key, "props-secret");
    }

    #[test]
    fn missing_secret_resolves_to_none() {
        let properties = Arc::new(Properties::new());
        properties.set(AWS_ACCESS_KEY_ID, "id");
        let resolver = CredentialResolver::properties_only(properties);
        assert!(resolver.resolve().is_none());
    }

    #[test]
    fn properties_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# credentials").unwrap();
        writeln!(file, "AWS_ACCESS_KEY_ID = AKIA123").unwrap();
        writeln!(file, "AWS_SECRET_ACCESS_KEY=s3cr=t").unwrap();
        let properties = Properties::load(file.path()).unwrap();
        assert_eq!(properties.get(AWS_ACCESS_KEY_ID).as_deref(), Some("AKIA123"));
        assert_eq!(properties.get(AWS_SECRET_ACCESS_KEY).as_deref(), Some("s3cr=t"));
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let credentials = Credentials {
            access_key_id: "id".into(),
            secret_access_key: "hunter2".into(),
        };
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
