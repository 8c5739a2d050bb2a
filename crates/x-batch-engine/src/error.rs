//! Error types for XML engine operations

/// Result type for XML engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type reported by an expression engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Input document or parameter value is not well-formed XML
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Expression or stylesheet failed to compile
    #[error("compilation error: {0}")]
    Compile(String),

    /// Expression failed at evaluation time
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// A namespace prefix used by the expression has no declaration
    #[error("undeclared namespace prefix: {0}")]
    UndeclaredPrefix(String),

    /// An imported or included resource could not be resolved
    #[error("unresolved resource {uri}: {message}")]
    UnresolvedResource { uri: String, message: String },

    /// Requested feature is not supported by this engine
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),

    /// Type conversion error
    #[error("type conversion error: {0}")]
    TypeConversion(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new compilation error
    pub fn compile<S: Into<String>>(msg: S) -> Self {
        Error::Compile(msg.into())
    }

    /// Create a new evaluation error
    pub fn evaluation<S: Into<String>>(msg: S) -> Self {
        Error::Evaluation(msg.into())
    }

    /// Create a new XML parsing error
    pub fn xml_parse<S: Into<String>>(msg: S) -> Self {
        Error::XmlParse(msg.into())
    }

    /// Create a new unresolved resource error
    pub fn unresolved<U: Into<String>, M: Into<String>>(uri: U, msg: M) -> Self {
        Error::UnresolvedResource {
            uri: uri.into(),
            message: msg.into(),
        }
    }
}
