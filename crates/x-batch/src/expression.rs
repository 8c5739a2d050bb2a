//! The transferable half of a processor

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use x_batch_engine::{ExpressionKind, ExtensionFunctionRef};

use crate::namespaces::NamespaceMappings;

/// Immutable expression configuration, captured at construction and
/// shipped with the processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Expression text, query module or stylesheet
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespaces: NamespaceMappings,
    /// Engine configuration properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension_functions: Vec<ExtensionFunctionRef>,
}

impl Expression {
    pub fn new(kind: ExpressionKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            namespaces: NamespaceMappings::new(),
            features: BTreeMap::new(),
            extension_functions: Vec::new(),
        }
    }

    pub fn xpath(text: impl Into<String>) -> Self {
        Self::new(ExpressionKind::XPath, text)
    }

    pub fn xquery(text: impl Into<String>) -> Self {
        Self::new(ExpressionKind::XQuery, text)
    }

    pub fn xslt(stylesheet: impl Into<String>) -> Self {
        Self::new(ExpressionKind::Xslt, stylesheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tables_are_omitted_from_json() {
        let json = serde_json::to_value(Expression::xpath("/a")).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "xpath", "text": "/a" }));

        let parsed: Expression = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, Expression::xpath("/a"));
    }
}
