//! Process-local object store

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{ObjectMetadata, ObjectStoreBackend, PutObject, StoreConnector};
use crate::credentials::Credentials;
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct StoredObject {
    put: PutObject,
    last_modified: DateTime<Utc>,
}

/// Process-local object store, for tests and single-node runs
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<(String, String), StoredObject>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object directly, bypassing put metadata
    pub fn insert(&self, bucket: &str, key: &str, content: &str) {
        let body = content.as_bytes().to_vec();
        let put = PutObject {
            content_length: body.len() as u64,
            body,
            content_type: "text/plain".to_string(),
            content_encoding: super::CONTENT_ENCODING.to_string(),
            server_side_encryption: None,
        };
        self.store(bucket, key, put);
    }

    /// The last put for `bucket`/`key`, metadata included
    pub fn last_put(&self, bucket: &str, key: &str) -> Option<PutObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.value().put.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, bucket: &str, key: &str, put: PutObject) {
        let object = StoredObject {
            put,
            last_modified: Utc::now(),
        };
        self.objects.insert((bucket.to_string(), key.to_string()), object);
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

impl ObjectStoreBackend for InMemoryObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.lookup(bucket, key).map(|object| object.put.body)
    }

    fn put(&self, bucket: &str, key: &str, object: PutObject) -> Result<(), StoreError> {
        self.store(bucket, key, object);
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StoreError> {
        let object = self.lookup(bucket, key)?;
        Ok(ObjectMetadata {
            content_length: object.put.body.len() as u64,
            last_modified: object.last_modified,
            content_type: Some(object.put.content_type),
        })
    }
}

/// Hands out a shared [`InMemoryObjectStore`] regardless of credentials
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: Arc<InMemoryObjectStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<InMemoryObjectStore>) -> Self {
        Self { store }
    }
}

impl StoreConnector for MemoryConnector {
    fn connect(&self, _credentials: &Credentials) -> Result<Arc<dyn ObjectStoreBackend>, StoreError> {
        Ok(Arc::clone(&self.store) as Arc<dyn ObjectStoreBackend>)
    }
}
