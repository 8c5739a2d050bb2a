//! Error types for x-batch

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to the remote object store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("object store client not initialized")]
    NotInitialized,

    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("access denied to {bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("key {key:?} in bucket {bucket} cannot be addressed")]
    InvalidKey { bucket: String, key: String },

    #[error("object {bucket}/{key} is not valid UTF-8")]
    InvalidUtf8 { bucket: String, key: String },

    #[error("object store error: {0}")]
    Backend(String),
}

/// A resource fetch that failed and was not cached
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to fetch {key}: {message}")]
pub struct FetchError {
    pub key: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot compile {}: {message}", summarize(.expression))]
    Compile { expression: String, message: String },

    #[error("cannot evaluate {}: {message}", summarize(.expression))]
    Evaluation { expression: String, message: String },

    #[error("processor for {} is not activated", summarize(.0))]
    NotActivated(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("namespace registry is not initialized")]
    NamespacesNotInitialized,

    #[error("namespace table line {line}: {message}")]
    NamespaceParse { line: usize, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("partition {index} failed: {message}")]
    Partition { index: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shorten long expressions and stylesheets for messages
pub(crate) fn summarize(expression: &str) -> String {
    const LIMIT: usize = 120;
    let flat: String = expression
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= LIMIT {
        format!("{:?}", flat)
    } else {
        let head: String = flat.chars().take(LIMIT).collect();
        format!("{:?}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_expressions_are_truncated_in_messages() {
        let stylesheet = format!("<xsl:stylesheet>{}</xsl:stylesheet>", "x".repeat(500));
        let err = Error::Compile {
            expression: stylesheet.clone(),
            message: "XTSE0010".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.len() < 200);
        assert!(rendered.ends_with("XTSE0010"));
        // the full text stays available to callers
        if let Error::Compile { expression, .. } = err {
            assert_eq!(expression, stylesheet);
        }
    }
}
