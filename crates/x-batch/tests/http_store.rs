//! Object store and include resolution over HTTP

use std::sync::Arc;

use wiremock::matchers::{header, method, path, query_param, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};
use x_batch::credentials::{AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY};
use x_batch::{
    CachingUriResolver, CredentialResolver, HttpConnector, Properties, RemoteObjectStore, ResourceCache, StoreError,
};
use x_batch_engine::UriResolver;

fn http_store(endpoint: &str) -> RemoteObjectStore {
    let properties = Arc::new(Properties::new());
    properties.set(AWS_ACCESS_KEY_ID, "AKIDEXAMPLE");
    properties.set(AWS_SECRET_ACCESS_KEY, "wJalrXUtnFEMI");
    let store = RemoteObjectStore::new(
        Arc::new(HttpConnector::new(endpoint)),
        CredentialResolver::properties_only(properties),
    );
    assert!(store.init());
    store
}

#[tokio::test]
async fn test_get_object_text() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stylesheets/meta/json.xsl"))
        .and(query_param("X-Amz-Algorithm", "AWS4-HMAC-SHA256"))
        .and(query_param_contains("X-Amz-Credential", "AKIDEXAMPLE/"))
        .and(query_param_contains("X-Amz-Credential", "/us-east-1/s3/aws4_request"))
        .and(|request: &wiremock::Request| {
            request.headers.get("authorization").is_none()
                && request.url.query_pairs().any(|(name, _)| name == "X-Amz-Signature")
        })
        .respond_with(ResponseTemplate::new(200).set_body_string("<xsl:stylesheet version=\"2.0\"/>"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || http_store(&uri).get("stylesheets", "meta/json.xsl"))
        .await
        .unwrap();

    assert_eq!(result.unwrap(), "<xsl:stylesheet version=\"2.0\"/>");
}

#[tokio::test]
async fn test_status_codes_map_to_store_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/b/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/secret.xml"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/b/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/broken.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (missing, denied, length, broken) = tokio::task::spawn_blocking(move || {
        let store = http_store(&uri);
        (
            store.get("b", "missing.xml"),
            store.get("b", "secret.xml"),
            store.length("b", "missing.xml"),
            store.get("b", "broken.xml"),
        )
    })
    .await
    .unwrap();

    assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    assert!(matches!(denied, Err(StoreError::AccessDenied { .. })));
    assert!(matches!(length, Err(StoreError::NotFound { .. })));
    assert!(matches!(broken, Err(StoreError::Backend(_))));
}

#[tokio::test]
async fn test_put_sends_encryption_and_encoding_headers() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/out/result.xml"))
        .and(header("content-type", "text/xml"))
        .and(header("content-encoding", "UTF-8"))
        .and(header("x-amz-server-side-encryption", "AES256"))
        .and(query_param(
            "X-Amz-SignedHeaders",
            "content-encoding;content-type;host;x-amz-server-side-encryption",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/out/result.xml"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let (put, delete) = tokio::task::spawn_blocking(move || {
        let store = http_store(&uri);
        (
            store.put("out", "result.xml", "<result/>", "text/xml"),
            store.delete("out", "result.xml"),
        )
    })
    .await
    .unwrap();

    assert!(put.is_ok());
    assert!(delete.is_ok());
}

#[tokio::test]
async fn test_keys_keep_empty_segments_and_reject_dot_segments() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/b//leading.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<leading/>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/secret.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<secret/>"))
        .expect(0)
        .mount(&server)
        .await;

    let uri = server.uri();
    let (leading, parent, current) = tokio::task::spawn_blocking(move || {
        let store = http_store(&uri);
        (
            store.get("b", "/leading.xml"),
            store.get("b", "docs/../secret.xml"),
            store.get("b", "./secret.xml"),
        )
    })
    .await
    .unwrap();

    assert_eq!(leading.unwrap(), "<leading/>");
    assert!(matches!(parent, Err(StoreError::InvalidKey { .. })));
    assert!(matches!(current, Err(StoreError::InvalidKey { .. })));
}

#[tokio::test]
async fn test_http_includes_are_fetched_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/xsl/common.xsl"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<xsl:stylesheet/>"))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/xsl/main.xsl", server.uri());
    let (first, second) = tokio::task::spawn_blocking(move || {
        let store = Arc::new(http_store("http://127.0.0.1:9"));
        let resolver = CachingUriResolver::new(store, Arc::new(ResourceCache::new()));
        (
            resolver.resolve("common.xsl", Some(&base)).unwrap(),
            resolver.resolve("common.xsl", Some(&base)).unwrap(),
        )
    })
    .await
    .unwrap();

    assert_eq!(&*first, "<xsl:stylesheet/>");
    assert!(Arc::ptr_eq(&first, &second));
}
