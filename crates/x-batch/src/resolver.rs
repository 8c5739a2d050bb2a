//! Stylesheet import/include resolution backed by the include cache.
//!
//! Targets are made absolute first (relative hrefs are joined against the
//! importing stylesheet's URI), then looked up in the cache under that
//! absolute form. Misses are fetched by scheme:
//! - `s3://bucket/key` through the worker's object store
//! - `http://` and `https://` with a blocking reqwest client
//! - `file://` URLs and plain paths from the local filesystem

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use url::Url;
use x_batch_engine::error::{Error as EngineError, Result as EngineResult};
use x_batch_engine::UriResolver;

use crate::cache::ResourceCache;
use crate::store::RemoteObjectStore;

#[derive(Debug, Clone, PartialEq)]
enum Target {
    Url(Url),
    Path(PathBuf),
}

impl Target {
    fn cache_key(&self) -> String {
        match self {
            Target::Url(url) => url.to_string(),
            Target::Path(path) => path.display().to_string(),
        }
    }
}

fn absolutize(href: &str, base: Option<&str>) -> Result<Target, String> {
    if let Ok(url) = Url::parse(href) {
        return Ok(Target::Url(url));
    }
    match base {
        Some(base) => match Url::parse(base) {
            Ok(base) => base
                .join(href)
                .map(Target::Url)
                .map_err(|e| format!("cannot resolve {:?} against {}: {}", href, base, e)),
            Err(_) => {
                let dir = Path::new(base).parent().unwrap_or_else(|| Path::new(""));
                Ok(Target::Path(dir.join(href)))
            }
        },
        None => Ok(Target::Path(PathBuf::from(href))),
    }
}

/// [`UriResolver`] that memoizes every fetched include in a [`ResourceCache`]
#[derive(Debug, Clone)]
pub struct CachingUriResolver {
    store: Arc<RemoteObjectStore>,
    cache: Arc<ResourceCache>,
}

impl CachingUriResolver {
    pub fn new(store: Arc<RemoteObjectStore>, cache: Arc<ResourceCache>) -> Self {
        Self { store, cache }
    }

    fn fetch(&self, target: &Target) -> Result<String, String> {
        match target {
            Target::Path(path) => std::fs::read_to_string(path).map_err(|e| e.to_string()),
            Target::Url(url) => match url.scheme() {
                "s3" => {
                    let bucket = url
                        .host_str()
                        .ok_or_else(|| format!("{} has no bucket", url))?;
                    let key = url.path().trim_start_matches('/');
                    self.store.get(bucket, key).map_err(|e| e.to_string())
                }
                "http" | "https" => fetch_http(url),
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| format!("{} is not a local file", url))?;
                    std::fs::read_to_string(path).map_err(|e| e.to_string())
                }
                other => Err(format!("unsupported URI scheme {:?}", other)),
            },
        }
    }
}

fn fetch_http(url: &Url) -> Result<String, String> {
    let client = reqwest::blocking::Client::builder()
        .build()
        .map_err(|e| e.to_string())?;
    client
        .get(url.clone())
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .map_err(|e| e.to_string())
}

impl UriResolver for CachingUriResolver {
    fn resolve(&self, href: &str, base: Option<&str>) -> EngineResult<Arc<str>> {
        let target = absolutize(href, base).map_err(|message| EngineError::unresolved(href, message))?;
        let key = target.cache_key();
        debug!(href, key = %key, "resolving stylesheet resource");
        self.cache
            .get_or_fetch(&key, || self.fetch(&target))
            .map_err(|e| EngineError::unresolved(e.key, e.message))
    }
}
