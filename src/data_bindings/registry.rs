// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Factory registry resolving a binding kind to its constructor.
//!
//! # Example
//!
//! ```ignore
//! use processor_runtime::data_bindings::{DataBinding, DataBindingRegistry};
//!
//! let mut registry = DataBindingRegistry::new();
//! registry.register("redis", |config| {
//!     let binding = RedisBinding::new(&config.name, &config.url)?;
//!     Ok(Arc::new(binding) as Arc<dyn DataBinding>)
//! });
//!
//! let binding = registry.create(&DataBindingConfig::new("redis").with_name("cache"))?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::memory::{MemoryDataBinding, MEMORY_BINDING_KIND};
use super::DataBinding;
use crate::config::DataBindingConfig;

/// Factory function creating a binding from its configuration.
///
/// The factory only constructs the binding; connecting happens in `DataBinding::start`.
pub type DataBindingFactory =
    Box<dyn Fn(&DataBindingConfig) -> Result<Arc<dyn DataBinding>> + Send + Sync>;

/// Registry of data binding factories keyed by binding kind.
pub struct DataBindingRegistry {
    factories: HashMap<String, DataBindingFactory>,
}

impl Default for DataBindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataBindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds = self.registered_types();
        kinds.sort_unstable();
        f.debug_struct("DataBindingRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl DataBindingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the built-in `memory` kind registered.
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        registry.register(MEMORY_BINDING_KIND, |config| {
            Ok(Arc::new(MemoryDataBinding::from_config(config)) as Arc<dyn DataBinding>)
        });
        registry
    }

    /// Register a factory for a binding kind, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&DataBindingConfig) -> Result<Arc<dyn DataBinding>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// Construct a binding for the config's normalized `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if no factory is registered for the kind or the factory fails.
    pub fn create(&self, config: &DataBindingConfig) -> Result<Arc<dyn DataBinding>> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| anyhow!("unknown data binding kind '{}'", config.kind))?;

        factory(config)
    }

    pub fn has_factory(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}
