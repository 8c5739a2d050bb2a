//! Expression processors.
//!
//! A processor pairs a transferable [`Expression`] with the compiled engine
//! handle built from it. Only the expression and the output method travel
//! when a processor is serialized; the handle is rebuilt by `activate` in
//! every execution context.
//!
//! ```text
//! Constructed --activate--> Ready --serialize--> Constructed (remote) --activate--> Ready
//! ```

mod xpath;
mod xquery;
mod xslt;

pub use xpath::XPathProcessor;
pub use xquery::XQueryProcessor;
pub use xslt::XsltProcessor;

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use x_batch_engine::{CompileRequest, CompiledExpression, DocumentSource, ExpressionKind, Sequence, UriResolver};

use crate::context::WorkerContext;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::namespaces::{default_mappings, NamespaceMappings};
use crate::output::{OutputMethod, Serializer};
use crate::resolver::CachingUriResolver;

/// Process-local state built by `activate`
struct Compiled {
    handle: Box<dyn CompiledExpression>,
    serializer: Serializer,
}

/// State shared by every processor kind
#[derive(Serialize, Deserialize)]
pub(crate) struct ProcessorCore {
    expression: Expression,
    #[serde(default)]
    output_method: OutputMethod,
    #[serde(skip)]
    compiled: Option<Compiled>,
}

impl ProcessorCore {
    pub(crate) fn new(expression: Expression) -> Self {
        Self {
            expression,
            output_method: OutputMethod::default(),
            compiled: None,
        }
    }

    pub(crate) fn expression(&self) -> &Expression {
        &self.expression
    }

    pub(crate) fn expression_mut(&mut self) -> &mut Expression {
        // edits invalidate the compiled handle
        self.compiled = None;
        &mut self.expression
    }

    pub(crate) fn output_method(&self) -> OutputMethod {
        self.output_method
    }

    pub(crate) fn set_output_method(&mut self, method: OutputMethod) {
        self.output_method = method;
    }

    pub(crate) fn is_activated(&self) -> bool {
        self.compiled.is_some()
    }

    /// Statically known namespaces: built-ins, worker table, own mappings
    fn namespaces(&self, ctx: &WorkerContext) -> NamespaceMappings {
        let mut namespaces = default_mappings();
        if let Some(table) = ctx.namespaces().mappings() {
            namespaces.extend(table.iter().map(|(p, u)| (p.clone(), u.clone())));
        }
        namespaces.extend(self.expression.namespaces.clone());
        namespaces
    }

    fn compile_error(&self, message: impl Into<String>) -> Error {
        let message = message.into();
        error!(kind = %self.expression.kind, error = %message, "compilation failed");
        Error::Compile {
            expression: self.expression.text.clone(),
            message,
        }
    }

    /// Compile the expression against the worker context.
    ///
    /// On failure the processor stays in its previous state.
    pub(crate) fn activate(&mut self, ctx: &WorkerContext) -> Result<()> {
        let kind = self.expression.kind;
        let engine = ctx.engine();
        if !engine.supports(kind) {
            return Err(self.compile_error(format!("engine {} does not support {}", engine.name(), kind)));
        }
        let extension_functions = ctx
            .extensions()
            .resolve(&self.expression.extension_functions)
            .map_err(|name| self.compile_error(format!("unknown extension function {}", name)))?;
        let resolver: Option<Arc<dyn UriResolver>> = match kind {
            ExpressionKind::Xslt => Some(Arc::new(CachingUriResolver::new(
                Arc::clone(ctx.store()),
                Arc::clone(ctx.includes()),
            ))),
            _ => None,
        };
        let namespaces = self.namespaces(ctx);
        let request = CompileRequest {
            kind,
            text: &self.expression.text,
            namespaces: &namespaces,
            features: &self.expression.features,
            extension_functions: &extension_functions,
            resolver,
        };

        info!(kind = %kind, engine = engine.name(), namespaces = namespaces.len(), "compiling expression");
        let handle = engine
            .compile(&request)
            .map_err(|e| self.compile_error(e.to_string()))?;
        self.compiled = Some(Compiled {
            handle,
            serializer: Serializer::new(),
        });
        Ok(())
    }

    fn compiled(&mut self) -> Result<&mut Compiled> {
        let text = &self.expression.text;
        self.compiled
            .as_mut()
            .ok_or_else(|| Error::NotActivated(text.clone()))
    }

    pub(crate) fn evaluation_error(&self, message: impl Into<String>) -> Error {
        let message = message.into();
        error!(kind = %self.expression.kind, error = %message, "evaluation failed");
        Error::Evaluation {
            expression: self.expression.text.clone(),
            message,
        }
    }

    /// Run the compiled handle against one document
    pub(crate) fn evaluate(&mut self, document: DocumentSource<'_>) -> Result<Sequence> {
        let result = self.compiled()?.handle.evaluate(document);
        result.map_err(|e| self.evaluation_error(e.to_string()))
    }

    /// Evaluate and serialize with the current output method
    pub(crate) fn evaluate_serialized(&mut self, document: DocumentSource<'_>) -> Result<String> {
        let sequence = self.evaluate(document)?;
        let method = self.output_method;
        let compiled = self.compiled()?;
        Ok(compiled.serializer.serialize(method, &sequence))
    }

    /// Run `f` against the compiled handle, mapping engine errors
    pub(crate) fn with_handle<T>(
        &mut self,
        f: impl FnOnce(&mut dyn CompiledExpression) -> x_batch_engine::error::Result<T>,
    ) -> Result<T> {
        let result = f(self.compiled()?.handle.as_mut());
        result.map_err(|e| self.evaluation_error(e.to_string()))
    }

    pub(crate) fn read_document<R: Read>(&self, mut reader: R) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| self.evaluation_error(format!("cannot read document: {}", e)))?;
        Ok(bytes)
    }
}

/// A fresh copy holds the expression and output method but is not activated
impl Clone for ProcessorCore {
    fn clone(&self) -> Self {
        Self {
            expression: self.expression.clone(),
            output_method: self.output_method,
            compiled: None,
        }
    }
}

impl fmt::Debug for ProcessorCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorCore")
            .field("expression", &self.expression)
            .field("output_method", &self.output_method)
            .field("activated", &self.is_activated())
            .finish()
    }
}
