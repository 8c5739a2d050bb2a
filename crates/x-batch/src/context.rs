//! Worker-wide state shared by processors and dispatch adapters.
//!
//! One [`WorkerContext`] exists per worker process. It holds the engine
//! handle plus the lazily initialized singletons: the object store client,
//! the namespace registry, the stylesheet and include caches and the
//! extension function registry. Cloning is cheap; clones share state.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use x_batch_engine::{ExpressionEngine, ExtensionFunction};

use crate::cache::ResourceCache;
use crate::config::WorkerConfig;
use crate::credentials::{CredentialResolver, Properties};
use crate::error::Result;
use crate::extension::ExtensionRegistry;
use crate::namespaces::NamespaceRegistry;
use crate::store::{InMemoryObjectStore, MemoryConnector, RemoteObjectStore, StoreConnector};

#[derive(Clone)]
pub struct WorkerContext {
    engine: Arc<dyn ExpressionEngine>,
    store: Arc<RemoteObjectStore>,
    namespaces: Arc<NamespaceRegistry>,
    stylesheets: Arc<ResourceCache>,
    includes: Arc<ResourceCache>,
    extensions: Arc<ExtensionRegistry>,
    properties: Arc<Properties>,
}

impl WorkerContext {
    pub fn builder(engine: Arc<dyn ExpressionEngine>) -> WorkerContextBuilder {
        WorkerContextBuilder {
            engine,
            connector: None,
            properties: None,
            credentials: None,
            extensions: Vec::new(),
        }
    }

    /// Build a context from a loaded [`WorkerConfig`]
    pub fn from_config(engine: Arc<dyn ExpressionEngine>, config: &WorkerConfig) -> Result<Self> {
        config.validate()?;
        let properties = config.properties()?;
        let connector = config.connector()?;
        info!(backend = ?config.store.backend, engine = engine.name(), "worker context configured");
        Ok(Self::builder(engine)
            .connector(connector)
            .properties(Arc::new(properties))
            .build())
    }

    pub fn engine(&self) -> &Arc<dyn ExpressionEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<RemoteObjectStore> {
        &self.store
    }

    pub fn namespaces(&self) -> &Arc<NamespaceRegistry> {
        &self.namespaces
    }

    /// Stylesheets fetched by bucket and key
    pub fn stylesheets(&self) -> &Arc<ResourceCache> {
        &self.stylesheets
    }

    /// `xsl:import` / `xsl:include` targets by absolute URI
    pub fn includes(&self) -> &Arc<ResourceCache> {
        &self.includes
    }

    pub fn extensions(&self) -> &Arc<ExtensionRegistry> {
        &self.extensions
    }

    pub fn properties(&self) -> &Arc<Properties> {
        &self.properties
    }

    /// Stylesheet text for `bucket`/`key`, fetched at most once per worker
    pub fn stylesheet(&self, bucket: &str, key: &str) -> Result<Arc<str>> {
        let cache_key = ResourceCache::stylesheet_key(bucket, key);
        Ok(self
            .stylesheets
            .get_or_fetch(&cache_key, || self.store.get(bucket, key))?)
    }

    /// Reset every singleton: store client, namespace table and caches
    pub fn clear(&self) {
        self.store.clear();
        self.namespaces.clear();
        self.stylesheets.clear();
        self.includes.clear();
        debug!("worker context cleared");
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("engine", &self.engine.name())
            .field("store", &self.store)
            .field("namespaces", &self.namespaces.is_initialized())
            .field("stylesheets", &self.stylesheets.len())
            .field("includes", &self.includes.len())
            .field("extensions", &self.extensions)
            .finish()
    }
}

pub struct WorkerContextBuilder {
    engine: Arc<dyn ExpressionEngine>,
    connector: Option<Arc<dyn StoreConnector>>,
    properties: Option<Arc<Properties>>,
    credentials: Option<CredentialResolver>,
    extensions: Vec<Arc<dyn ExtensionFunction>>,
}

impl WorkerContextBuilder {
    /// Store transport; defaults to a fresh in-memory store
    pub fn connector(mut self, connector: Arc<dyn StoreConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn properties(mut self, properties: Arc<Properties>) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Credential lookup; defaults to environment then properties
    pub fn credentials(mut self, credentials: CredentialResolver) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn extension(mut self, function: Arc<dyn ExtensionFunction>) -> Self {
        self.extensions.push(function);
        self
    }

    pub fn build(self) -> WorkerContext {
        let properties = self.properties.unwrap_or_default();
        let credentials = self
            .credentials
            .unwrap_or_else(|| CredentialResolver::new(Arc::clone(&properties)));
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(MemoryConnector::new(Arc::new(InMemoryObjectStore::new()))));
        let extensions = ExtensionRegistry::new();
        for function in self.extensions {
            extensions.register(function);
        }
        WorkerContext {
            engine: self.engine,
            store: Arc::new(RemoteObjectStore::new(connector, credentials)),
            namespaces: Arc::new(NamespaceRegistry::new()),
            stylesheets: Arc::new(ResourceCache::new()),
            includes: Arc::new(ResourceCache::new()),
            extensions: Arc::new(extensions),
            properties,
        }
    }
}
