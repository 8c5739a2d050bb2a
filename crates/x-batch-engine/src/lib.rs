//! Collaborator interface between x-batch processors and an XML
//! expression engine.
//!
//! This crate defines the traits an engine implements so the processor
//! layer can compile XPath, XQuery and XSLT once per execution context and
//! evaluate the compiled handle against many documents. It also defines the
//! result item model that processors serialize.

pub mod engine;
pub mod error;
pub mod extension;
pub mod item;
pub mod resolver;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use engine::{CompileRequest, CompiledExpression, DocumentSource, ExpressionEngine, ExpressionKind};
pub use error::Error;
pub use extension::{ExtensionFunction, ExtensionFunctionRef};
pub use item::{Atomic, Item, Node, NodeKind, Sequence};
pub use resolver::UriResolver;
