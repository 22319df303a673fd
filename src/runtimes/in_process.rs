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

//! Runtime for handlers compiled into the processor.
//!
//! Handlers are async closures registered by name in a [`HandlerRegistry`]. The
//! configured `spec.handler` is looked up once at construction, first as given and then
//! by its entrypoint (the part after `:`).
//!
//! ```ignore
//! let mut handlers = HandlerRegistry::new();
//! handlers.register("echo", |_context, event, logger| async move {
//!     logger.info(format!("echoing {} bytes", event.body.len()));
//!     Ok(Response::new(event.body))
//! });
//!
//! let runtime = InProcessRuntime::new(configuration, &handlers).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;

use crate::config::Configuration;
use crate::context::Context;
use crate::error::{Result, RuntimeError};
use crate::event::{Event, Response};
use crate::logging::FunctionLogger;
use crate::runtime::{Runtime, RuntimeBase, RuntimeBaseParams};

pub const IN_PROCESS_RUNTIME_KIND: &str = "rust";

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Response>>;

/// A registered function handler.
pub type Handler = Arc<dyn Fn(Context, Event, FunctionLogger) -> HandlerFuture + Send + Sync>;

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Context, Event, FunctionLogger) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |context, event, logger| handler(context, event, logger).boxed());
        self.handlers.insert(name.into(), handler);
    }

    /// Find the handler for `spec.handler`, trying the full name and then the entrypoint.
    pub fn resolve(&self, handler: &str) -> Option<Handler> {
        self.handlers.get(handler).cloned().or_else(|| {
            handler
                .split_once(':')
                .and_then(|(_, entrypoint)| self.handlers.get(entrypoint).cloned())
        })
    }

    /// Registered handler names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

pub struct InProcessRuntime {
    base: RuntimeBase,
    handler: Handler,
}

impl InProcessRuntime {
    pub async fn new(configuration: Configuration, handlers: &HandlerRegistry) -> Result<Self> {
        Self::with_params(RuntimeBaseParams::new(configuration), handlers).await
    }

    /// Construct with custom base parameters (binding registry, platform resolver).
    pub async fn with_params(params: RuntimeBaseParams, handlers: &HandlerRegistry) -> Result<Self> {
        params.configuration.validate()?;
        let handler_name = params.configuration.spec.handler.clone();
        let handler = handlers.resolve(&handler_name).ok_or_else(|| {
            RuntimeError::configuration(format!(
                "no handler registered for '{}' (available: {})",
                handler_name,
                handlers.names().join(", ")
            ))
        })?;

        let base = RuntimeBase::new(params.with_kind(IN_PROCESS_RUNTIME_KIND)).await?;
        debug!("In-process runtime resolved handler '{handler_name}'");
        Ok(Self { base, handler })
    }
}

#[async_trait]
impl Runtime for InProcessRuntime {
    fn base(&self) -> &RuntimeBase {
        &self.base
    }

    async fn process_event(
        &self,
        event: Event,
        function_logger: &FunctionLogger,
    ) -> Result<Response> {
        self.base
            .run_event(&event, || {
                let future = (self.handler)(
                    self.base.context().clone(),
                    event.clone(),
                    function_logger.clone(),
                );
                async move { future.await.map_err(RuntimeError::EventProcessing) }
            })
            .await
    }
}
