//! S3-compatible object store over HTTP.
//!
//! Requests are presigned with AWS Signature V4 query parameters and sent
//! with a blocking reqwest client.

use std::iter;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jiff::Timestamp;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::StatusCode;
use rusty_s3::signing::sign;
use rusty_s3::Method;
use url::Url;

use super::{ObjectMetadata, ObjectStoreBackend, PutObject, StoreConnector};
use crate::credentials::Credentials;
use crate::error::StoreError;

const SSE_HEADER: &str = "x-amz-server-side-encryption";

/// Region used in the signature scope when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Lifetime of a presigned request URL
const PRESIGN_EXPIRY: Duration = Duration::from_secs(300);

/// Object store reached over HTTP, path-style addressing.
///
/// Operations map to presigned requests on `{endpoint}/{bucket}/{key}`:
/// - `get` performs a GET
/// - `put` performs a PUT with content type, encoding and encryption headers;
///   the body length is sent as `Content-Length`
/// - `delete` performs a DELETE
/// - `head` performs a HEAD and reads `Content-Length` / `Last-Modified`
///
/// Keys are sent segment by segment, so empty segments survive. Keys with
/// `.` or `..` segments cannot be addressed by a URL and are rejected.
pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
    region: String,
    credentials: Credentials,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, credentials: Credentials) -> Result<Self, StoreError> {
        Self::with_client(Client::new(), endpoint, credentials)
    }

    /// Create a store with a custom reqwest client
    pub fn with_client(client: Client, endpoint: &str, credentials: Credentials) -> Result<Self, StoreError> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| StoreError::Backend(format!("invalid endpoint {}: {}", endpoint, e)))?;
        if endpoint.host_str().is_none() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StoreError::Backend(format!("endpoint {} is not an http(s) URL", endpoint)));
        }
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Ok(Self {
            client,
            endpoint,
            region: DEFAULT_REGION.to_string(),
            credentials,
        })
    }

    /// Region named in the signature scope
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, StoreError> {
        if key.split('/').any(|segment| matches!(segment, "." | "..")) {
            return Err(StoreError::InvalidKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Backend(format!("endpoint {} cannot be a base", self.endpoint)))?
            .pop_if_empty()
            .push(bucket)
            .extend(key.split('/'));
        Ok(url)
    }

    /// Presign `url` for `method`. `headers` must be lowercase, sorted by
    /// name, and sent unchanged with the request.
    fn presign(&self, method: Method, url: Url, headers: &[(&str, &str)], at: &Timestamp) -> Url {
        sign(
            at,
            method,
            url,
            &self.credentials.access_key_id,
            &self.credentials.secret_access_key,
            None,
            &self.region,
            PRESIGN_EXPIRY.as_secs(),
            iter::empty(),
            headers.iter().copied(),
        )
    }

    fn signed(&self, method: Method, bucket: &str, key: &str, headers: &[(&str, &str)]) -> Result<Url, StoreError> {
        let url = self.object_url(bucket, key)?;
        Ok(self.presign(method, url, headers, &Timestamp::now()))
    }

    fn send(&self, request: RequestBuilder, bucket: &str, key: &str) -> Result<Response, StoreError> {
        let response = request.send().map_err(|e| StoreError::Transport(e.to_string()))?;
        check_status(response, bucket, key)
    }
}

fn check_status(response: Response, bucket: &str, key: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::NOT_FOUND => Err(StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }),
        other => Err(StoreError::Backend(format!(
            "{} {}/{} returned {}",
            response.url().path(),
            bucket,
            key,
            other
        ))),
    }
}

fn header_str<'a>(response: &'a Response, name: reqwest::header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

impl ObjectStoreBackend for HttpObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.signed(Method::Get, bucket, key, &[])?;
        let response = self.send(self.client.get(url), bucket, key)?;
        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    fn put(&self, bucket: &str, key: &str, object: PutObject) -> Result<(), StoreError> {
        let mut headers = vec![
            ("content-encoding", object.content_encoding.as_str()),
            ("content-type", object.content_type.as_str()),
        ];
        if let Some(sse) = object.server_side_encryption.as_deref() {
            headers.push((SSE_HEADER, sse));
        }
        let url = self.signed(Method::Put, bucket, key, &headers)?;
        let mut request = self.client.put(url);
        for (name, value) in &headers {
            request = request.header(*name, *value);
        }
        self.send(request.body(object.body), bucket, key)?;
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let url = self.signed(Method::Delete, bucket, key, &[])?;
        self.send(self.client.delete(url), bucket, key)?;
        Ok(())
    }

    fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StoreError> {
        let url = self.signed(Method::Head, bucket, key, &[])?;
        let response = self.send(self.client.head(url), bucket, key)?;

        let content_length = header_str(&response, CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| StoreError::Backend(format!("{}/{}: missing Content-Length", bucket, key)))?;
        let last_modified = header_str(&response, LAST_MODIFIED)
            .ok_or_else(|| StoreError::Backend(format!("{}/{}: missing Last-Modified", bucket, key)))
            .and_then(|v| {
                DateTime::parse_from_rfc2822(v)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| StoreError::Backend(format!("{}/{}: bad Last-Modified {:?}: {}", bucket, key, v, e)))
            })?;
        let content_type = header_str(&response, CONTENT_TYPE).map(str::to_string);

        Ok(ObjectMetadata {
            content_length,
            last_modified,
            content_type,
        })
    }
}

/// Connects [`HttpObjectStore`] clients to a fixed endpoint
#[derive(Debug, Clone)]
pub struct HttpConnector {
    endpoint: String,
    region: String,
}

impl HttpConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: DEFAULT_REGION.to_string(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

impl StoreConnector for HttpConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ObjectStoreBackend>, StoreError> {
        let store = HttpObjectStore::new(&self.endpoint, credentials.clone())?.with_region(self.region.as_str());
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI".into(),
        }
    }

    fn store() -> HttpObjectStore {
        HttpObjectStore::new("http://localhost:9000", credentials()).unwrap()
    }

    fn query(url: &Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn object_urls_are_path_style() {
        let url = store().object_url("stylesheets", "xsl/meta 2 json.xsl").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/stylesheets/xsl/meta%202%20json.xsl"
        );
    }

    #[test]
    fn endpoint_prefix_path_is_kept() {
        let store = HttpObjectStore::new("http://gateway/storage", credentials()).unwrap();
        let url = store.object_url("b", "k").unwrap();
        assert_eq!(url.as_str(), "http://gateway/storage/b/k");
    }

    #[test]
    fn empty_key_segments_are_kept() {
        let store = store();
        assert_eq!(
            store.object_url("b", "/leading.xml").unwrap().path(),
            "/b//leading.xml"
        );
        assert_eq!(store.object_url("b", "a//c.xml").unwrap().path(), "/b/a//c.xml");
        assert_eq!(store.object_url("b", "dir/").unwrap().path(), "/b/dir/");
        assert_eq!(store.object_url("b", "a.b/..c/x.").unwrap().path(), "/b/a.b/..c/x.");
    }

    #[test]
    fn dot_segment_keys_are_rejected() {
        let store = store();
        for key in ["docs/../secret.xml", "./x.xml", "a/.", ".."] {
            assert!(
                matches!(store.object_url("b", key), Err(StoreError::InvalidKey { .. })),
                "{key}"
            );
        }
    }

    #[test]
    fn presigned_urls_carry_a_sigv4_scope() {
        let store = store().with_region("eu-west-1");
        let url = store.object_url("b", "k.xml").unwrap();
        let at: Timestamp = "2024-05-01T12:00:00Z".parse().unwrap();
        let signed = store.presign(Method::Get, url.clone(), &[], &at);

        assert_eq!(signed.path(), "/b/k.xml");
        assert_eq!(query(&signed, "X-Amz-Algorithm").as_deref(), Some("AWS4-HMAC-SHA256"));
        assert_eq!(
            query(&signed, "X-Amz-Credential").as_deref(),
            Some("AKIDEXAMPLE/20240501/eu-west-1/s3/aws4_request")
        );
        assert_eq!(query(&signed, "X-Amz-Date").as_deref(), Some("20240501T120000Z"));
        assert!(query(&signed, "X-Amz-Signature").is_some());
        assert!(!signed.as_str().contains("wJalrXUtnFEMI"));

        // signature depends on method and signed headers
        let put = store.presign(Method::Put, url.clone(), &[(SSE_HEADER, "AES256")], &at);
        assert_ne!(query(&put, "X-Amz-Signature"), query(&signed, "X-Amz-Signature"));
        assert_eq!(
            query(&put, "X-Amz-SignedHeaders").as_deref(),
            Some("host;x-amz-server-side-encryption")
        );
        let again = store.presign(Method::Get, url, &[], &at);
        assert_eq!(again, signed);
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(matches!(
            HttpObjectStore::new("not a url", credentials()),
            Err(StoreError::Backend(_))
        ));
        assert!(matches!(
            HttpObjectStore::new("ftp://host/", credentials()),
            Err(StoreError::Backend(_))
        ));
    }
}
