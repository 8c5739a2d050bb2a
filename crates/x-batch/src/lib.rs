//! Lifecycle and caching layer for XPath, XQuery and XSLT processors run
//! on batch workers.
//!
//! A driver builds a processor from expression text, ships it to workers
//! by value and each worker rebuilds the compiled form once per partition.
//! Worker-wide state lives in a [`WorkerContext`]:
//!
//! - [`RemoteObjectStore`]: lazily initialized bucket/key client
//! - [`NamespaceRegistry`]: prefix table loaded once per worker
//! - [`ResourceCache`]: fetch-once caches for stylesheets and includes
//!
//! The expression engine itself is a collaborator behind
//! [`x_batch_engine::ExpressionEngine`].

pub mod cache;
pub mod config;
pub mod context;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod expression;
pub mod extension;
pub mod logging;
pub mod namespaces;
pub mod output;
pub mod processor;
pub mod resolver;
pub mod store;

pub use cache::ResourceCache;
pub use config::{StoreBackend, StoreConfig, WorkerConfig};
pub use context::{WorkerContext, WorkerContextBuilder};
pub use credentials::{CredentialResolver, Credentials, Properties};
pub use dispatch::{
    EvaluateTask, Evaluator, FilterTask, LocalExecutor, PartitionAdapter, Record, RecordTask, StoredStylesheetTask,
    TransformTask, WorkerInit, ERROR_MARKER,
};
pub use error::{Error, FetchError, Result, StoreError};
pub use expression::Expression;
pub use extension::ExtensionRegistry;
pub use namespaces::{parse_mappings, NamespaceMappings, NamespaceRegistry};
pub use output::{OutputMethod, Serializer};
pub use processor::{XPathProcessor, XQueryProcessor, XsltProcessor};
pub use resolver::CachingUriResolver;
pub use store::{
    HttpConnector, HttpObjectStore, InMemoryObjectStore, MemoryConnector, ObjectLocation, ObjectStoreBackend,
    RemoteObjectStore, StoreConnector,
};

pub use x_batch_engine::{ExpressionEngine, ExpressionKind};
