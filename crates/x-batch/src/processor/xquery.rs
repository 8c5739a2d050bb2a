//! XQuery evaluation with external variables

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use x_batch_engine::{Atomic, DocumentSource, ExpressionKind, ExtensionFunctionRef};

use super::ProcessorCore;
use crate::context::WorkerContext;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::namespaces::NamespaceMappings;
use crate::output::OutputMethod;

/// Compiles one XQuery and evaluates it against many documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct XQueryProcessor {
    core: ProcessorCore,
}

impl XQueryProcessor {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            core: ProcessorCore::new(Expression::xquery(query)),
        }
    }

    pub fn compile(query: impl Into<String>, ctx: &WorkerContext) -> Result<Self> {
        Self::new(query).activated(ctx)
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

    pub fn activate(&mut self, ctx: &WorkerContext) -> Result<()> {
        if self.core.expression().kind != ExpressionKind::XQuery {
            return Err(Error::InvalidArgument(format!(
                "{} expression in an XQuery processor",
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

    /// Bind an `xs:string` external variable.
    ///
    /// The binding lives on the compiled handle: it persists across calls
    /// until rebound and does not survive serialization.
    pub fn set_external_variable(&mut self, name: &str, value: &str) -> Result<()> {
        let value = Atomic::String(value.to_string());
        self.core.with_handle(|handle| handle.set_external_variable(name, value))
    }

    pub fn evaluate(&mut self, xml: &str) -> Result<String> {
        self.core.evaluate_serialized(DocumentSource::Text(xml))
    }

    pub fn evaluate_reader<R: Read>(&mut self, reader: R) -> Result<String> {
        let bytes = self.core.read_document(reader)?;
        self.core.evaluate_serialized(DocumentSource::Bytes(&bytes))
    }
}
