//! Worker-side extension function registry

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use x_batch_engine::{ExtensionFunction, ExtensionFunctionRef};

/// Extension function implementations available to processors on this
/// worker, looked up by name when a processor is activated
#[derive(Default)]
pub struct ExtensionRegistry {
    functions: RwLock<HashMap<ExtensionFunctionRef, Arc<dyn ExtensionFunction>>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any function with the same name
    pub fn register(&self, function: Arc<dyn ExtensionFunction>) {
        self.functions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(function.name(), function);
    }

    pub fn get(&self, name: &ExtensionFunctionRef) -> Option<Arc<dyn ExtensionFunction>> {
        self.functions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Implementations for every reference, or the first unknown name
    pub fn resolve(
        &self,
        names: &[ExtensionFunctionRef],
    ) -> Result<Vec<Arc<dyn ExtensionFunction>>, ExtensionFunctionRef> {
        names
            .iter()
            .map(|name| self.get(name).ok_or_else(|| name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.functions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let functions = self.functions.read().unwrap_or_else(|e| e.into_inner());
        f.debug_set().entries(functions.keys()).finish()
    }
}
