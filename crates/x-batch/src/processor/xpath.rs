//! XPath filter and evaluate

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use x_batch_engine::{DocumentSource, ExpressionKind, ExtensionFunctionRef};

use super::ProcessorCore;
use crate::context::WorkerContext;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::namespaces::NamespaceMappings;
use crate::output::OutputMethod;

/// Compiles one XPath expression and applies it to many documents.
///
/// `filter` answers whether the expression selects anything (its effective
/// boolean value); `evaluate` returns the serialized result sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct XPathProcessor {
    core: ProcessorCore,
}

impl XPathProcessor {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            core: ProcessorCore::new(Expression::xpath(expression)),
        }
    }

    /// Build and activate in one step
    pub fn compile(expression: impl Into<String>, ctx: &WorkerContext) -> Result<Self> {
        Self::new(expression).activated(ctx)
    }

    pub fn with_namespaces(mut self, namespaces: NamespaceMappings) -> Self {
        self.core.expression_mut().namespaces = namespaces;
        self
    }

    pub fn with_features(mut self, features: BTreeMap<String, serde_json::Value>) -> Self {
        self.core.expression_mut().features = features;
        self
    }

    pub fn with_extension_functions(mut self, functions: Vec<ExtensionFunctionRef>) -> Self {
        self.core.expression_mut().extension_functions = functions;
        self
    }

    pub fn with_output_method(mut self, method: OutputMethod) -> Self {
        self.core.set_output_method(method);
        self
    }

    pub fn activated(mut self, ctx: &WorkerContext) -> Result<Self> {
        self.activate(ctx)?;
        Ok(self)
    }

    /// Compile against `ctx`; required again after deserialization
    pub fn activate(&mut self, ctx: &WorkerContext) -> Result<()> {
        if self.core.expression().kind != ExpressionKind::XPath {
            return Err(Error::InvalidArgument(format!(
                "{} expression in an XPath processor",
                self.core.expression().kind
            )));
        }
        self.core.activate(ctx)
    }

    pub fn is_activated(&self) -> bool {
        self.core.is_activated()
    }

    pub fn expression(&self) -> &Expression {
        self.core.expression()
    }

    pub fn output_method(&self) -> OutputMethod {
        self.core.output_method()
    }

    pub fn set_output_method(&mut self, method: &str) -> Result<()> {
        self.core.set_output_method(method.parse()?);
        Ok(())
    }

    /// Effective boolean value of the expression against `xml`
    pub fn filter(&mut self, xml: &str) -> Result<bool> {
        self.filter_source(DocumentSource::Text(xml))
    }

    pub fn filter_reader<R: Read>(&mut self, reader: R) -> Result<bool> {
        let bytes = self.core.read_document(reader)?;
        self.filter_source(DocumentSource::Bytes(&bytes))
    }

    fn filter_source(&mut self, document: DocumentSource<'_>) -> Result<bool> {
        let sequence = self.core.evaluate(document)?;
        sequence
            .effective_boolean_value()
            .map_err(|e| self.core.evaluation_error(e.to_string()))
    }

    /// Serialized result sequence; `""` when nothing is selected
    pub fn evaluate(&mut self, xml: &str) -> Result<String> {
        self.core.evaluate_serialized(DocumentSource::Text(xml))
    }

    pub fn evaluate_reader<R: Read>(&mut self, reader: R) -> Result<String> {
        let bytes = self.core.read_document(reader)?;
        self.core.evaluate_serialized(DocumentSource::Bytes(&bytes))
    }
}
