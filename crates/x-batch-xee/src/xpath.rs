//! ExpressionEngine implementation for xee

use tracing::debug;
use x_batch_engine::error::{Error, Result};
use x_batch_engine::{CompileRequest, CompiledExpression, DocumentSource, ExpressionEngine, ExpressionKind, Sequence};
use xee_xpath::context::StaticContextBuilder;
use xee_xpath::query::SequenceQuery;
use xee_xpath::{Documents, Queries, Query};

use crate::convert;

/// xee XPath 3.1 engine
#[derive(Debug, Clone, Copy, Default)]
pub struct XeeEngine;

impl XeeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEngine for XeeEngine {
    fn name(&self) -> &str {
        "xee"
    }

    fn supports(&self, kind: ExpressionKind) -> bool {
        kind == ExpressionKind::XPath
    }

    fn compile(&self, request: &CompileRequest<'_>) -> Result<Box<dyn CompiledExpression>> {
        if !self.supports(request.kind) {
            return Err(Error::FeatureNotSupported(format!("{} expressions", request.kind)));
        }
        if let Some(function) = request.extension_functions.first() {
            return Err(Error::FeatureNotSupported(format!(
                "extension function {}",
                function.name()
            )));
        }
        if let Some(feature) = request.features.keys().find(|f| !self.supports_feature(f)) {
            return Err(Error::FeatureNotSupported(feature.clone()));
        }

        let mut builder = StaticContextBuilder::default();
        for (prefix, uri) in request.namespaces {
            builder.add_namespace(prefix, uri);
        }
        let query = Queries::new(builder)
            .sequence(request.text)
            .map_err(|e| Error::compile(e.to_string()))?;
        debug!(expression = request.text, "compiled with xee");
        Ok(Box::new(XeeExpression { query }))
    }

    fn supported_features(&self) -> Vec<String> {
        vec!["xpath-3.1".to_string()]
    }
}

/// A compiled xee query.
///
/// Each evaluation parses the document into a fresh document set, so no
/// state carries over between records.
pub struct XeeExpression {
    query: SequenceQuery,
}

impl CompiledExpression for XeeExpression {
    fn evaluate(&mut self, document: DocumentSource<'_>) -> Result<Sequence> {
        let text = document.to_text()?;
        let mut documents = Documents::new();
        let handle = documents
            .add_string_without_uri(&text)
            .map_err(|e| Error::xml_parse(e.to_string()))?;
        let result = self
            .query
            .execute(&mut documents, handle)
            .map_err(|e| Error::evaluation(e.to_string()))?;
        convert::sequence(documents.xot(), &result)
    }
}
