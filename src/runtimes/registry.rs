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

//! Factory registry resolving `spec.runtime` to a runtime variant.
//!
//! `spec.runtime` is looked up as given (`python:3.11`) and then by its name part
//! (`python`), so versioned kinds share one factory.
//!
//! # Example
//!
//! ```ignore
//! use processor_runtime::runtimes::{HandlerRegistry, RuntimeRegistry};
//!
//! let mut registry = RuntimeRegistry::with_builtin_kinds(handlers);
//! registry.register_subprocess_kind("python");
//!
//! let runtime = registry.create(RuntimeBaseParams::new(configuration)).await?;
//! runtime.start().await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::debug;

use super::in_process::{HandlerRegistry, InProcessRuntime, IN_PROCESS_RUNTIME_KIND};
use super::shell::{ShellRuntime, SHELL_RUNTIME_KIND};
use super::subprocess::{SubprocessRuntime, SUBPROCESS_RUNTIME_KIND};
use crate::error::{Result, RuntimeError};
use crate::runtime::{Runtime, RuntimeBaseParams};

/// Factory function constructing a runtime from its base parameters.
pub type RuntimeFactory =
    Box<dyn Fn(RuntimeBaseParams) -> BoxFuture<'static, Result<Box<dyn Runtime>>> + Send + Sync>;

/// Registry of runtime factories keyed by runtime kind.
pub struct RuntimeRegistry {
    factories: HashMap<String, RuntimeFactory>,
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuntimeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeRegistry")
            .field("kinds", &self.registered_types())
            .finish()
    }
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the `rust`, `shell` and `subprocess` kinds registered.
    /// In-process functions are resolved from `handlers`.
    pub fn with_builtin_kinds(handlers: HandlerRegistry) -> Self {
        let handlers = Arc::new(handlers);
        let mut registry = Self::new();

        registry.register(IN_PROCESS_RUNTIME_KIND, move |params| {
            let handlers = handlers.clone();
            async move {
                let runtime = InProcessRuntime::with_params(params, &handlers).await?;
                Ok(Box::new(runtime) as Box<dyn Runtime>)
            }
        });
        registry.register(SHELL_RUNTIME_KIND, |params| async move {
            let runtime = ShellRuntime::with_params(params).await?;
            Ok(Box::new(runtime) as Box<dyn Runtime>)
        });
        registry.register_subprocess_kind(SUBPROCESS_RUNTIME_KIND);
        registry
    }

    /// Register a factory for a runtime kind, replacing any previous one.
    pub fn register<F, Fut>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(RuntimeBaseParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn Runtime>>> + Send + 'static,
    {
        let factory: RuntimeFactory = Box::new(move |params| factory(params).boxed());
        self.factories.insert(kind.into(), factory);
    }

    /// Serve `kind` (e.g. `python`, `nodejs`) with a wrapper process.
    pub fn register_subprocess_kind(&mut self, kind: impl Into<String>) {
        self.register(kind, |params| async move {
            let runtime = SubprocessRuntime::with_params(params).await?;
            Ok(Box::new(runtime) as Box<dyn Runtime>)
        });
    }

    /// The registered kind serving `runtime`, if any.
    pub fn resolve_kind<'a>(&self, runtime: &'a str) -> Option<&'a str> {
        if self.factories.contains_key(runtime) {
            return Some(runtime);
        }
        runtime
            .split_once(':')
            .map(|(name, _)| name)
            .filter(|name| self.factories.contains_key(*name))
    }

    /// Construct the runtime named by `spec.runtime`.
    ///
    /// # Errors
    ///
    /// `Configuration` when `spec.runtime` is empty or names no registered kind, otherwise
    /// whatever the variant's construction reports.
    pub async fn create(&self, params: RuntimeBaseParams) -> Result<Box<dyn Runtime>> {
        let runtime = params.configuration.spec.runtime.clone();
        if runtime.is_empty() {
            return Err(RuntimeError::configuration(format!(
                "function '{}' does not name a runtime",
                params.configuration.meta.name
            )));
        }

        let factory = self
            .resolve_kind(&runtime)
            .and_then(|kind| self.factories.get(kind))
            .ok_or_else(|| {
                RuntimeError::configuration(format!(
                    "unknown runtime kind '{}' (available: {})",
                    runtime,
                    self.registered_types().join(", ")
                ))
            })?;

        debug!(
            "Creating '{}' runtime for function '{}'",
            runtime, params.configuration.meta.name
        );
        factory(params).await
    }

    pub fn has_factory(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn registered_types(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, Response};
    use crate::status::RuntimeStatus;
    use crate::test_support::helpers::test_fixtures::create_test_configuration;

    fn registry() -> RuntimeRegistry {
        let mut handlers = HandlerRegistry::new();
        handlers.register("handler", |_context, event: Event, _logger| async move {
            Ok(Response::new(event.body))
        });
        let mut registry = RuntimeRegistry::with_builtin_kinds(handlers);
        registry.register_subprocess_kind("python");
        registry
    }

    #[test]
    fn test_resolve_kind() {
        let registry = registry();
        assert_eq!(registry.resolve_kind("shell"), Some("shell"));
        assert_eq!(registry.resolve_kind("python:3.11"), Some("python"));
        assert_eq!(registry.resolve_kind("golang"), None);
        assert_eq!(
            registry.registered_types(),
            vec!["python", "rust", "shell", "subprocess"]
        );
    }

    #[tokio::test]
    async fn test_create_in_process() {
        let configuration = create_test_configuration("echo")
            .with_runtime(IN_PROCESS_RUNTIME_KIND)
            .build();
        let runtime = registry()
            .create(RuntimeBaseParams::new(configuration))
            .await
            .unwrap();

        assert_eq!(runtime.kind(), "rust");
        assert!(!runtime.supports_restart());
        runtime.start().await.unwrap();

        let logger = runtime.function_logger().clone();
        let response = runtime
            .process_event(Event::new("ping"), &logger)
            .await
            .unwrap();
        assert_eq!(response.body_str(), Some("ping"));
        assert_eq!(runtime.status().await, RuntimeStatus::Ready);
    }

    #[tokio::test]
    async fn test_versioned_kind_uses_subprocess() {
        let configuration = create_test_configuration("py")
            .with_runtime("python:3.11")
            .with_runtime_attribute("command", "/opt/wrapper/run".into())
            .build();
        let runtime = registry()
            .create(RuntimeBaseParams::new(configuration))
            .await
            .unwrap();

        assert_eq!(runtime.kind(), "python:3.11");
        assert!(runtime.supports_restart());
        assert!(runtime.supports_control_communication());
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let configuration = create_test_configuration("go").with_runtime("golang").build();
        let err = registry()
            .create(RuntimeBaseParams::new(configuration))
            .await
            .err()
            .unwrap();
        match err {
            RuntimeError::Configuration { message } => {
                assert!(message.starts_with("unknown runtime kind 'golang'"), "{message}")
            }
            other => panic!("Expected Configuration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_runtime() {
        let configuration = create_test_configuration("none").build();
        let err = registry()
            .create(RuntimeBaseParams::new(configuration))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::Configuration { .. }));
    }
}
