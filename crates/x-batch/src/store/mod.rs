//! Remote object store client.
//!
//! [`RemoteObjectStore`] wraps a keyed blob store (bucket + key) behind a
//! lazily constructed client. The client only exists once credentials
//! resolve; until then every operation fails with
//! [`StoreError::NotInitialized`]. Transport details live behind
//! [`ObjectStoreBackend`], built by a [`StoreConnector`].

mod http;
mod memory;

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::credentials::{CredentialResolver, Credentials};
use crate::error::StoreError;

pub use http::{HttpConnector, HttpObjectStore};
pub use memory::{InMemoryObjectStore, MemoryConnector};

/// Server-side encryption requested for every put
pub const SERVER_SIDE_ENCRYPTION: &str = "AES256";
pub const CONTENT_ENCODING: &str = "UTF-8";

/// Bucket and key of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Body and metadata of a put
#[derive(Debug, Clone, PartialEq)]
pub struct PutObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub content_encoding: String,
    pub content_length: u64,
    pub server_side_encryption: Option<String>,
}

/// Metadata reported for a stored object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMetadata {
    pub content_length: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
}

/// Bucket + key transport operations
pub trait ObjectStoreBackend: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;
    fn put(&self, bucket: &str, key: &str, object: PutObject) -> Result<(), StoreError>;
    fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
    fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StoreError>;
}

/// Builds a backend client once credentials are known
pub trait StoreConnector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ObjectStoreBackend>, StoreError>;
}

impl<F> StoreConnector for F
where
    F: Fn(&Credentials) -> Result<Arc<dyn ObjectStoreBackend>, StoreError> + Send + Sync,
{
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ObjectStoreBackend>, StoreError> {
        self(credentials)
    }
}

/// Lazily initialized object store client shared by a worker
pub struct RemoteObjectStore {
    client: RwLock<Option<Arc<dyn ObjectStoreBackend>>>,
    init_lock: Mutex<()>,
    connector: Arc<dyn StoreConnector>,
    credentials: CredentialResolver,
}

impl RemoteObjectStore {
    pub fn new(connector: Arc<dyn StoreConnector>, credentials: CredentialResolver) -> Self {
        Self {
            client: RwLock::new(None),
            init_lock: Mutex::new(()),
            connector,
            credentials,
        }
    }

    fn current(&self) -> Option<Arc<dyn ObjectStoreBackend>> {
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    /// Construct the client if credentials resolve.
    ///
    /// Idempotent; never fails. Returns whether the client is ready.
    pub fn init(&self) -> bool {
        if self.is_ready() {
            return true;
        }
        let Some(credentials) = self.credentials.resolve() else {
            error!(severity = "fatal", "unable to init the object store client: credentials not found");
            return false;
        };

        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_ready() {
            return true;
        }
        match self.connector.connect(&credentials) {
            Ok(client) => {
                *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some(client);
                info!(access_key_id = %credentials.access_key_id, "object store client initialized");
                true
            }
            Err(err) => {
                error!(severity = "fatal", error = %err, "unable to init the object store client");
                false
            }
        }
    }

    /// Drop the client; idempotent
    pub fn clear(&self) {
        if !self.is_ready() {
            return;
        }
        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.client.write().unwrap_or_else(|e| e.into_inner()).take().is_some() {
            debug!("object store client cleared");
        }
    }

    fn client(&self) -> Result<Arc<dyn ObjectStoreBackend>, StoreError> {
        self.current().ok_or(StoreError::NotInitialized)
    }

    /// Fetch an object as UTF-8 text
    pub fn get(&self, bucket: &str, key: &str) -> Result<String, StoreError> {
        let result = self.client().and_then(|client| {
            let bytes = client.get(bucket, key)?;
            String::from_utf8(bytes).map_err(|_| StoreError::InvalidUtf8 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        });
        logged("retrieving", bucket, key, result)
    }

    /// Store `content` UTF-8 encoded, with encryption at rest requested
    pub fn put(&self, bucket: &str, key: &str, content: &str, content_type: &str) -> Result<(), StoreError> {
        let result = self.client().and_then(|client| {
            let body = content.as_bytes().to_vec();
            let object = PutObject {
                content_length: body.len() as u64,
                body,
                content_type: content_type.to_string(),
                content_encoding: CONTENT_ENCODING.to_string(),
                server_side_encryption: Some(SERVER_SIDE_ENCRYPTION.to_string()),
            };
            client.put(bucket, key, object)
        });
        logged("writing", bucket, key, result)
    }

    pub fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let result = self.client().and_then(|client| client.delete(bucket, key));
        logged("deleting", bucket, key, result)
    }

    /// Content length in bytes
    pub fn length(&self, bucket: &str, key: &str) -> Result<u64, StoreError> {
        let result = self
            .client()
            .and_then(|client| client.head(bucket, key))
            .map(|metadata| metadata.content_length);
        logged("getting object length", bucket, key, result)
    }

    pub fn last_modified(&self, bucket: &str, key: &str) -> Result<DateTime<Utc>, StoreError> {
        let result = self
            .client()
            .and_then(|client| client.head(bucket, key))
            .map(|metadata| metadata.last_modified);
        logged("getting last modified date", bucket, key, result)
    }
}

fn logged<T>(action: &str, bucket: &str, key: &str, result: Result<T, StoreError>) -> Result<T, StoreError> {
    if let Err(err) = &result {
        error!(bucket, key, error = %err, "problems {} object store", action);
    }
    result
}

impl fmt::Debug for RemoteObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObjectStore")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Properties, AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn properties_with_credentials() -> Arc<Properties> {
        let properties = Arc::new(Properties::new());
        properties.set(AWS_ACCESS_KEY_ID, "id");
        properties.set(AWS_SECRET_ACCESS_KEY, "secret");
        properties
    }

    fn memory_store(properties: Arc<Properties>) -> (RemoteObjectStore, Arc<InMemoryObjectStore>) {
        let backend = Arc::new(InMemoryObjectStore::new());
        let store = RemoteObjectStore::new(
            Arc::new(MemoryConnector::new(Arc::clone(&backend))),
            CredentialResolver::properties_only(properties),
        );
        (store, backend)
    }

    #[test]
    fn get_without_init_fails_with_not_initialized() {
        let (store, _) = memory_store(properties_with_credentials());
        assert_eq!(store.get("bucket", "key"), Err(StoreError::NotInitialized));
    }

    #[test]
    fn init_without_credentials_leaves_store_absent() {
        let (store, _) = memory_store(Arc::new(Properties::new()));
        assert!(!store.init());
        assert!(!store.is_ready());
        assert_eq!(store.length("b", "k"), Err(StoreError::NotInitialized));
    }

    #[test]
    fn put_sets_encryption_and_encoding_metadata() {
        let (store, backend) = memory_store(properties_with_credentials());
        assert!(store.init());
        store.put("bucket", "doc.xml", "<a>é</a>", "text/xml").unwrap();

        let put = backend.last_put("bucket", "doc.xml").unwrap();
        assert_eq!(put.content_type, "text/xml");
        assert_eq!(put.content_encoding, "UTF-8");
        assert_eq!(put.content_length, "<a>é</a>".len() as u64);
        assert_eq!(put.server_side_encryption.as_deref(), Some("AES256"));
        assert_eq!(store.get("bucket", "doc.xml").unwrap(), "<a>é</a>");
        assert_eq!(store.length("bucket", "doc.xml").unwrap(), "<a>é</a>".len() as u64);
    }

    #[test]
    fn missing_object_is_not_found() {
        let (store, _) = memory_store(properties_with_credentials());
        store.init();
        assert!(matches!(
            store.get("bucket", "nope"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn init_is_idempotent_and_clear_resets() {
        let connects = Arc::new(AtomicUsize::new(0));
        let backend: Arc<dyn ObjectStoreBackend> = Arc::new(InMemoryObjectStore::new());
        let counter = Arc::clone(&connects);
        let connector = move |_: &Credentials| -> Result<Arc<dyn ObjectStoreBackend>, StoreError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&backend))
        };
        let store = RemoteObjectStore::new(
            Arc::new(connector),
            CredentialResolver::properties_only(properties_with_credentials()),
        );

        assert!(store.init());
        assert!(store.init());
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        store.clear();
        store.clear();
        assert!(!store.is_ready());
        assert!(store.init());
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_init_connects_once() {
        let connects = Arc::new(AtomicUsize::new(0));
        let backend: Arc<dyn ObjectStoreBackend> = Arc::new(InMemoryObjectStore::new());
        let counter = Arc::clone(&connects);
        let connector = move |_: &Credentials| -> Result<Arc<dyn ObjectStoreBackend>, StoreError> {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::clone(&backend))
        };
        let store = Arc::new(RemoteObjectStore::new(
            Arc::new(connector),
            CredentialResolver::properties_only(properties_with_credentials()),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.init())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }
}
