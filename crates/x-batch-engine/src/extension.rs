//! Extension functions

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::item::Sequence;

/// Serializable name of an extension function.
///
/// Processors carry references only; the implementation is looked up in
/// the worker's registry when the processor is activated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtensionFunctionRef {
    pub namespace: String,
    pub local_name: String,
}

impl ExtensionFunctionRef {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for ExtensionFunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{{{}}}{}", self.namespace, self.local_name)
    }
}

/// A host function callable from expressions
pub trait ExtensionFunction: Send + Sync {
    fn name(&self) -> ExtensionFunctionRef;

    /// Number of arguments the function accepts
    fn arity(&self) -> usize;

    fn call(&self, arguments: &[Sequence]) -> Result<Sequence>;
}
