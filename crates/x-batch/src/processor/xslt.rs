//! XSLT transformation with stylesheet parameters

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

/// Compiles one stylesheet and applies it to many documents.
///
/// `xsl:import` and `xsl:include` targets are resolved through the
/// worker's include cache at activation, so each one is fetched once per
/// worker. Stylesheet parameters are passed as XML text and parsed as
/// documents by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct XsltProcessor {
    core: ProcessorCore,
}

impl XsltProcessor {
    pub fn new(stylesheet: impl Into<String>) -> Self {
        Self {
            core: ProcessorCore::new(Expression::xslt(stylesheet)),
        }
    }

    pub fn compile(stylesheet: impl Into<String>, ctx: &WorkerContext) -> Result<Self> {
        Self::new(stylesheet).activated(ctx)
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
        if self.core.expression().kind != ExpressionKind::Xslt {
            return Err(Error::InvalidArgument(format!(
                "{} expression in an XSLT processor",
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

    /// Takes effect on the next transform, without recompiling
    pub fn set_output_method(&mut self, method: &str) -> Result<()> {
        self.core.set_output_method(method.parse()?);
        Ok(())
    }

    pub fn transform(&mut self, xml: &str) -> Result<String> {
        self.transform_source(DocumentSource::Text(xml), &BTreeMap::new())
    }

    pub fn transform_reader<R: Read>(&mut self, reader: R) -> Result<String> {
        let bytes = self.core.read_document(reader)?;
        self.transform_source(DocumentSource::Bytes(&bytes), &BTreeMap::new())
    }

    /// Transform with stylesheet parameters, name to XML text.
    ///
    /// Bindings from earlier calls are dropped first.
    pub fn transform_with_params(&mut self, xml: &str, params: &BTreeMap<String, String>) -> Result<String> {
        self.transform_source(DocumentSource::Text(xml), params)
    }

    fn transform_source(&mut self, document: DocumentSource<'_>, params: &BTreeMap<String, String>) -> Result<String> {
        self.core.with_handle(|handle| {
            handle.clear_parameters();
            params
                .iter()
                .try_for_each(|(name, value)| handle.bind_parameter(name, value))
        })?;
        self.core.evaluate_serialized(document)
    }
}
