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

//! Execution context handed to function code.
//!
//! A [`Context`] is assembled once per runtime instance, after every data binding has
//! started, and never changes afterwards. It carries the function identity, the trigger
//! that feeds this worker, the platform handle and one context object per data binding.
//!
//! # Example
//!
//! ```ignore
//! use processor_runtime::data_bindings::MemoryStore;
//!
//! let cache = context.data_binding::<MemoryStore>("cache").expect("cache binding");
//! cache.set("last-event", event.id.clone()).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;

use crate::config::Configuration;
use crate::data_bindings::{ContextObject, StartedDataBindings};
use crate::error::{Result, RuntimeError};
use crate::logging::FunctionLogger;
use crate::platform::{Platform, PlatformResolver};

/// Read-only execution context of one runtime instance.
///
/// Cloning is cheap; all clones share the same binding objects and platform handle.
#[derive(Clone)]
pub struct Context {
    logger: FunctionLogger,
    worker_id: usize,
    function_name: String,
    function_version: i64,
    trigger_kind: String,
    trigger_name: String,
    platform: Arc<dyn Platform>,
    data_bindings: Arc<HashMap<String, ContextObject>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bindings: Vec<&String> = self.data_bindings.keys().collect();
        bindings.sort();
        f.debug_struct("Context")
            .field("function_name", &self.function_name)
            .field("worker_id", &self.worker_id)
            .field("trigger_kind", &self.trigger_kind)
            .field("trigger_name", &self.trigger_name)
            .field("platform", &self.platform)
            .field("data_bindings", &bindings)
            .finish()
    }
}

impl Context {
    /// Build the context from the configuration and the started bindings.
    ///
    /// The platform is resolved first. Bindings whose context object cannot be produced
    /// fail the whole assembly; the caller is responsible for stopping the bindings.
    pub fn assemble(
        configuration: &Configuration,
        bindings: &StartedDataBindings,
        platform_resolver: &dyn PlatformResolver,
    ) -> Result<Self> {
        let platform =
            platform_resolver.resolve(&configuration.platform.kind, &configuration.meta.namespace)?;

        let mut data_bindings = HashMap::with_capacity(bindings.len());
        for (name, binding) in bindings {
            let object = binding
                .context_object()
                .with_context(|| format!("failed to get data binding context object '{name}'"))
                .map_err(RuntimeError::ContextAssembly)?;
            data_bindings.insert(name.clone(), object);
        }

        Ok(Self {
            logger: configuration.function_logger.clone(),
            worker_id: configuration.worker_id,
            function_name: configuration.meta.name.clone(),
            function_version: configuration.spec.version,
            trigger_kind: configuration.trigger_kind.clone(),
            trigger_name: configuration.trigger_name.clone(),
            platform,
            data_bindings: Arc::new(data_bindings),
        })
    }

    pub fn logger(&self) -> &FunctionLogger {
        &self.logger
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn function_version(&self) -> i64 {
        self.function_version
    }

    pub fn trigger_kind(&self) -> &str {
        &self.trigger_kind
    }

    pub fn trigger_name(&self) -> &str {
        &self.trigger_name
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// All binding objects keyed by binding name.
    pub fn data_bindings(&self) -> &HashMap<String, ContextObject> {
        &self.data_bindings
    }

    /// The binding object under `name`, if it exists and is a `T`.
    pub fn data_binding<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.data_bindings
            .get(name)
            .cloned()
            .and_then(|object| object.downcast::<T>().ok())
    }
}
