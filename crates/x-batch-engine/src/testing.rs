//! Scripted engine for tests.
//!
//! `ScriptedEngine` does not parse XPath, XQuery or XSLT. Each expression
//! text is registered up front together with a closure that produces the
//! result sequence from the document text and the compile-time context.
//! Compile calls are counted per expression so tests can observe when a
//! processor recompiles.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::engine::{CompileRequest, CompiledExpression, DocumentSource, ExpressionEngine, ExpressionKind};
use crate::error::{Error, Result};
use crate::extension::ExtensionFunction;
use crate::item::{Atomic, Sequence};

/// What a script sees when it runs
pub struct ScriptInput<'a> {
    pub document: &'a str,
    pub namespaces: &'a BTreeMap<String, String>,
    pub features: &'a BTreeMap<String, serde_json::Value>,
    /// Bound stylesheet parameters, as the XML text they were bound with
    pub parameters: &'a BTreeMap<String, String>,
    pub variables: &'a BTreeMap<String, Atomic>,
    /// Include targets resolved at compile time, by href
    pub includes: &'a BTreeMap<String, Arc<str>>,
    pub extension_functions: &'a [Arc<dyn ExtensionFunction>],
}

type Script = Arc<dyn Fn(&ScriptInput<'_>) -> Result<Sequence> + Send + Sync>;

/// Compile-time requirements of a scripted expression
#[derive(Debug, Clone, Default)]
pub struct ScriptOptions {
    /// Prefixes the expression uses; compilation fails if one is undeclared
    pub prefixes: Vec<String>,
    /// Hrefs resolved through the request's resolver at compile time
    pub includes: Vec<String>,
}

struct ScriptEntry {
    script: Script,
    options: ScriptOptions,
    compiles: Arc<AtomicUsize>,
}

/// Engine whose expressions are closures registered by the test
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: RwLock<HashMap<(ExpressionKind, String), ScriptEntry>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an expression without compile-time requirements
    pub fn script<F>(self, kind: ExpressionKind, text: &str, f: F) -> Self
    where
        F: Fn(&ScriptInput<'_>) -> Result<Sequence> + Send + Sync + 'static,
    {
        self.script_with(kind, text, ScriptOptions::default(), f)
    }

    /// Register an expression with prefix and include requirements
    pub fn script_with<F>(self, kind: ExpressionKind, text: &str, options: ScriptOptions, f: F) -> Self
    where
        F: Fn(&ScriptInput<'_>) -> Result<Sequence> + Send + Sync + 'static,
    {
        let entry = ScriptEntry {
            script: Arc::new(f),
            options,
            compiles: Arc::new(AtomicUsize::new(0)),
        };
        self.scripts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((kind, text.to_string()), entry);
        self
    }

    /// Number of successful and failed compile attempts for `text`
    pub fn compile_count(&self, kind: ExpressionKind, text: &str) -> usize {
        self.scripts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(kind, text.to_string()))
            .map(|entry| entry.compiles.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl ExpressionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn compile(&self, request: &CompileRequest<'_>) -> Result<Box<dyn CompiledExpression>> {
        let scripts = self.scripts.read().unwrap_or_else(|e| e.into_inner());
        let entry = scripts
            .get(&(request.kind, request.text.to_string()))
            .ok_or_else(|| {
                Error::compile(format!(
                    "XPST0003: syntax error in {} expression {:?}",
                    request.kind, request.text
                ))
            })?;
        entry.compiles.fetch_add(1, Ordering::SeqCst);

        for prefix in &entry.options.prefixes {
            if !request.namespaces.contains_key(prefix) {
                return Err(Error::UndeclaredPrefix(prefix.clone()));
            }
        }

        let mut includes = BTreeMap::new();
        for href in &entry.options.includes {
            let resolver = request.resolver.as_ref().ok_or_else(|| {
                Error::unresolved(href.clone(), "no URI resolver configured")
            })?;
            includes.insert(href.clone(), resolver.resolve(href, None)?);
        }

        Ok(Box::new(ScriptedExpression {
            script: Arc::clone(&entry.script),
            namespaces: request.namespaces.clone(),
            features: request.features.clone(),
            extension_functions: request.extension_functions.to_vec(),
            includes,
            parameters: BTreeMap::new(),
            variables: BTreeMap::new(),
        }))
    }

    fn supported_features(&self) -> Vec<String> {
        vec!["scripted".to_string()]
    }
}

struct ScriptedExpression {
    script: Script,
    namespaces: BTreeMap<String, String>,
    features: BTreeMap<String, serde_json::Value>,
    extension_functions: Vec<Arc<dyn ExtensionFunction>>,
    includes: BTreeMap<String, Arc<str>>,
    parameters: BTreeMap<String, String>,
    variables: BTreeMap<String, Atomic>,
}

/// Cheap stand-in for a parser: markup must start with `<` and end with `>`
fn check_markup(text: &str, what: &str) -> Result<()> {
    let trimmed = text.trim();
    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        Ok(())
    } else {
        Err(Error::xml_parse(format!(
            "{} is not well-formed: content is not allowed in prolog",
            what
        )))
    }
}

impl CompiledExpression for ScriptedExpression {
    fn evaluate(&mut self, document: DocumentSource<'_>) -> Result<Sequence> {
        let text = document.to_text()?;
        check_markup(&text, "document")?;
        let input = ScriptInput {
            document: &text,
            namespaces: &self.namespaces,
            features: &self.features,
            parameters: &self.parameters,
            variables: &self.variables,
            includes: &self.includes,
            extension_functions: &self.extension_functions,
        };
        (self.script)(&input)
    }

    fn bind_parameter(&mut self, name: &str, xml: &str) -> Result<()> {
        check_markup(xml, &format!("parameter ${}", name))?;
        self.parameters.insert(name.to_string(), xml.to_string());
        Ok(())
    }

    fn clear_parameters(&mut self) {
        self.parameters.clear();
    }

    fn set_external_variable(&mut self, name: &str, value: Atomic) -> Result<()> {
        self.variables.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Item, Node};

    fn request<'a>(
        kind: ExpressionKind,
        text: &'a str,
        namespaces: &'a BTreeMap<String, String>,
        features: &'a BTreeMap<String, serde_json::Value>,
    ) -> CompileRequest<'a> {
        CompileRequest {
            kind,
            text,
            namespaces,
            features,
            extension_functions: &[],
            resolver: None,
        }
    }

    #[test]
    fn unregistered_expression_fails_to_compile() {
        let engine = ScriptedEngine::new();
        let (ns, features) = (BTreeMap::new(), BTreeMap::new());
        let result = engine.compile(&request(ExpressionKind::XPath, "/a", &ns, &features));
        assert!(matches!(result, Err(Error::Compile(_))));
    }

    #[test]
    fn compile_counts_are_tracked_per_expression() {
        let engine = ScriptedEngine::new().script(ExpressionKind::XPath, "/a", |input| {
            Ok(Sequence::from(vec![Item::Node(Node::element(input.document, ""))]))
        });
        let (ns, features) = (BTreeMap::new(), BTreeMap::new());
        for _ in 0..3 {
            engine
                .compile(&request(ExpressionKind::XPath, "/a", &ns, &features))
                .unwrap();
        }
        assert_eq!(engine.compile_count(ExpressionKind::XPath, "/a"), 3);
        assert_eq!(engine.compile_count(ExpressionKind::XQuery, "/a"), 0);
    }

    #[test]
    fn undeclared_prefix_is_rejected() {
        let engine = ScriptedEngine::new().script_with(
            ExpressionKind::XPath,
            "/a:name",
            ScriptOptions {
                prefixes: vec!["a".to_string()],
                ..Default::default()
            },
            |_| Ok(Sequence::empty()),
        );
        let (ns, features) = (BTreeMap::new(), BTreeMap::new());
        let result = engine.compile(&request(ExpressionKind::XPath, "/a:name", &ns, &features));
        assert!(matches!(result, Err(Error::UndeclaredPrefix(p)) if p == "a"));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let engine =
            ScriptedEngine::new().script(ExpressionKind::XPath, ".", |_| Ok(Sequence::empty()));
        let (ns, features) = (BTreeMap::new(), BTreeMap::new());
        let mut compiled = engine
            .compile(&request(ExpressionKind::XPath, ".", &ns, &features))
            .unwrap();
        assert!(matches!(
            compiled.evaluate(DocumentSource::Text("not xml")),
            Err(Error::XmlParse(_))
        ));
        assert!(compiled.evaluate(DocumentSource::Text("<ok/>")).is_ok());
    }
}
