//! Expression engine abstraction traits

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extension::ExtensionFunction;
use crate::item::{Atomic, Sequence};
use crate::resolver::UriResolver;

/// Expression language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionKind {
    XPath,
    XQuery,
    Xslt,
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpressionKind::XPath => "XPath",
            ExpressionKind::XQuery => "XQuery",
            ExpressionKind::Xslt => "XSLT",
        };
        f.write_str(name)
    }
}

/// Input document handed to a compiled expression
#[derive(Debug, Clone, Copy)]
pub enum DocumentSource<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> DocumentSource<'a> {
    /// Document content as UTF-8 text
    pub fn to_text(&self) -> Result<Cow<'a, str>> {
        match *self {
            DocumentSource::Text(text) => Ok(Cow::Borrowed(text)),
            DocumentSource::Bytes(bytes) => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|e| Error::xml_parse(format!("document is not valid UTF-8: {}", e))),
        }
    }
}

impl<'a> From<&'a str> for DocumentSource<'a> {
    fn from(text: &'a str) -> Self {
        DocumentSource::Text(text)
    }
}

impl<'a> From<&'a [u8]> for DocumentSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        DocumentSource::Bytes(bytes)
    }
}

/// Everything an engine needs to compile one expression
#[derive(Clone)]
pub struct CompileRequest<'a> {
    pub kind: ExpressionKind,
    /// Expression text, XQuery module or XSLT stylesheet
    pub text: &'a str,
    /// Statically known namespaces, prefix to URI
    pub namespaces: &'a BTreeMap<String, String>,
    /// Engine configuration properties
    pub features: &'a BTreeMap<String, serde_json::Value>,
    pub extension_functions: &'a [Arc<dyn ExtensionFunction>],
    /// Resolver for `xsl:import` / `xsl:include` targets
    pub resolver: Option<Arc<dyn UriResolver>>,
}

impl fmt::Debug for CompileRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileRequest")
            .field("kind", &self.kind)
            .field("text", &self.text)
            .field("namespaces", &self.namespaces)
            .field("features", &self.features)
            .field("extension_functions", &self.extension_functions.len())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// A compiled, reusable expression.
///
/// Handles are process-local and are never transmitted; they are rebuilt
/// by compiling again in every execution context. Evaluation takes
/// `&mut self`, so a handle serves one caller at a time. Handles need not
/// be `Send`: each partition thread compiles its own.
pub trait CompiledExpression {
    /// Evaluate against a document and return the result sequence
    fn evaluate(&mut self, document: DocumentSource<'_>) -> Result<Sequence>;

    /// Bind a stylesheet parameter; `xml` is parsed as a document first
    fn bind_parameter(&mut self, name: &str, _xml: &str) -> Result<()> {
        Err(Error::FeatureNotSupported(format!(
            "stylesheet parameter ${}",
            name
        )))
    }

    /// Drop all stylesheet parameter bindings
    fn clear_parameters(&mut self) {}

    /// Bind an external variable declared by a query
    fn set_external_variable(&mut self, name: &str, _value: Atomic) -> Result<()> {
        Err(Error::FeatureNotSupported(format!(
            "external variable ${}",
            name
        )))
    }
}

/// Trait for XML expression engines.
///
/// An engine compiles XPath, XQuery and XSLT text into
/// [`CompiledExpression`] handles. Engines are shared by every processor
/// in a worker, so they must be `Send + Sync`.
pub trait ExpressionEngine: Send + Sync {
    /// Engine name for diagnostics
    fn name(&self) -> &str;

    /// Check if the engine handles a language at all
    fn supports(&self, _kind: ExpressionKind) -> bool {
        true
    }

    /// Compile an expression
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Box<dyn CompiledExpression>>;

    /// Get the list of feature strings supported by this engine
    fn supported_features(&self) -> Vec<String> {
        Vec::new()
    }

    /// Check if a specific feature is supported
    fn supports_feature(&self, feature: &str) -> bool {
        self.supported_features()
            .iter()
            .any(|f| f.eq_ignore_ascii_case(feature))
    }
}
