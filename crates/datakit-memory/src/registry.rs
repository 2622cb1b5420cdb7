//! A minimal service locator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use datakit_core::{Sequence, ServiceProvider};

/// Resolves the default and named sequence providers.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    default_sequence: Option<Arc<dyn Sequence>>,
    sequences: HashMap<String, Arc<dyn Sequence>>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.sequences.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ServiceRegistry")
            .field("default_sequence", &self.default_sequence.is_some())
            .field("sequences", &names)
            .finish()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the provider used when a directive names none.
    pub fn with_sequence(mut self, sequence: Arc<dyn Sequence>) -> Self {
        self.default_sequence = Some(sequence);
        self
    }

    /// Register a named provider. Names are case-insensitive.
    pub fn with_named_sequence(mut self, name: &str, sequence: Arc<dyn Sequence>) -> Self {
        self.sequences.insert(name.to_lowercase(), sequence);
        self
    }
}

impl ServiceProvider for ServiceRegistry {
    fn sequence(&self, name: Option<&str>) -> Option<Arc<dyn Sequence>> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => self.default_sequence.clone(),
            Some(name) => self.sequences.get(&name.to_lowercase()).cloned(),
        }
    }
}
