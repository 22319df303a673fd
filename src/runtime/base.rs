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

//! Base implementation for common runtime functionality.
//!
//! This module provides `RuntimeBase` which encapsulates what every runtime variant
//! shares:
//! - Configuration validation and the scoped process environment
//! - Eager data binding startup and context assembly
//! - Status, statistics and the control message broker
//! - Event admission, timing and drain
//!
//! # Variant Architecture
//!
//! Each runtime variant:
//! 1. Creates a `RuntimeBase` with `RuntimeBaseParams`
//! 2. Implements the `Runtime` trait, returning the base from `base()`
//! 3. Overrides only the capabilities its backend provides (start, restart, drain)

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};
use tracing::Instrument;

use super::gate::EventGate;
use crate::config::Configuration;
use crate::context::Context;
use crate::control::{ControlMessageBroker, UnsupportedControlMessageBroker};
use crate::data_bindings::{
    start_data_bindings, stop_data_bindings, DataBindingRegistry, StartedDataBindings,
    DEFAULT_BINDING_START_CONCURRENCY,
};
use crate::error::{Result, RuntimeError};
use crate::event::{Event, Response};
use crate::logging::FunctionLogger;
use crate::platform::{DefaultPlatformResolver, PlatformResolver};
use crate::statistics::Statistics;
use crate::status::{is_operation_valid, Operation, RuntimeStatus};

pub const ENV_HANDLER: &str = "NUCLIO_HANDLER";
pub const ENV_FUNCTION_NAME: &str = "NUCLIO_FUNCTION_NAME";
pub const ENV_FUNCTION_DESCRIPTION: &str = "NUCLIO_FUNCTION_DESCRIPTION";
pub const ENV_FUNCTION_VERSION: &str = "NUCLIO_FUNCTION_VERSION";
pub const ENV_FUNCTION_HANDLER: &str = "NUCLIO_FUNCTION_HANDLER";

/// Kind reported when neither the configuration nor the variant names one.
const GENERIC_RUNTIME_KIND: &str = "generic";

/// Parameters for creating a RuntimeBase instance.
///
/// # Example
///
/// ```ignore
/// use processor_runtime::runtime::{RuntimeBase, RuntimeBaseParams};
///
/// let params = RuntimeBaseParams::new(configuration)
///     .with_kind("shell")
///     .with_data_binding_registry(Arc::new(registry))
///     .with_binding_start_concurrency(8);
///
/// let base = RuntimeBase::new(params).await?;
/// ```
pub struct RuntimeBaseParams {
    pub configuration: Configuration,
    /// Variant kind, used when `spec.runtime` is empty
    pub kind: String,
    pub data_binding_registry: Arc<DataBindingRegistry>,
    pub platform_resolver: Arc<dyn PlatformResolver>,
    /// Defaults to an unsupported broker naming the runtime kind
    pub control_message_broker: Option<Arc<dyn ControlMessageBroker>>,
    pub binding_start_concurrency: usize,
}

impl std::fmt::Debug for RuntimeBaseParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBaseParams")
            .field("function", &self.configuration.meta.name)
            .field("kind", &self.kind)
            .field("data_binding_registry", &self.data_binding_registry)
            .field(
                "control_message_broker",
                &self.control_message_broker.as_ref().map(|_| "<broker>"),
            )
            .field("binding_start_concurrency", &self.binding_start_concurrency)
            .finish()
    }
}

impl RuntimeBaseParams {
    /// Create params with the built-in binding kinds and the default platform resolver.
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            kind: GENERIC_RUNTIME_KIND.to_string(),
            data_binding_registry: Arc::new(DataBindingRegistry::with_builtin_kinds()),
            platform_resolver: Arc::new(DefaultPlatformResolver),
            control_message_broker: None,
            binding_start_concurrency: DEFAULT_BINDING_START_CONCURRENCY,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_data_binding_registry(mut self, registry: Arc<DataBindingRegistry>) -> Self {
        self.data_binding_registry = registry;
        self
    }

    pub fn with_platform_resolver(mut self, resolver: Arc<dyn PlatformResolver>) -> Self {
        self.platform_resolver = resolver;
        self
    }

    pub fn with_control_message_broker(mut self, broker: Arc<dyn ControlMessageBroker>) -> Self {
        self.control_message_broker = Some(broker);
        self
    }

    /// Number of bindings started at the same time. Values below 1 are treated as 1.
    pub fn with_binding_start_concurrency(mut self, concurrency: usize) -> Self {
        self.binding_start_concurrency = concurrency.max(1);
        self
    }
}

/// Base implementation for common runtime functionality
pub struct RuntimeBase {
    kind: String,
    configuration: Configuration,
    environment: HashMap<String, String>,
    status: RwLock<RuntimeStatus>,
    statistics: Statistics,
    control_message_broker: Arc<dyn ControlMessageBroker>,
    /// Taken by the first stop
    data_bindings: Mutex<Option<StartedDataBindings>>,
    context: Context,
    gate: EventGate,
}

impl std::fmt::Debug for RuntimeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBase")
            .field("kind", &self.kind)
            .field("function", &self.configuration.meta.name)
            .field("worker_id", &self.configuration.worker_id)
            .field("context", &self.context)
            .finish()
    }
}

impl RuntimeBase {
    /// Validate the configuration, start every data binding and assemble the context.
    ///
    /// Either returns a complete instance with status `Initializing`, or fails with all
    /// started bindings stopped again.
    pub async fn new(params: RuntimeBaseParams) -> Result<Self> {
        let RuntimeBaseParams {
            configuration,
            kind,
            data_binding_registry,
            platform_resolver,
            control_message_broker,
            binding_start_concurrency,
        } = params;

        configuration.validate()?;

        let kind = if configuration.spec.runtime.is_empty() {
            kind
        } else {
            configuration.spec.runtime.clone()
        };
        let environment = build_environment(&configuration);

        info!(
            "Creating runtime '{}' for function '{}' (worker {})",
            kind, configuration.meta.name, configuration.worker_id
        );

        let bindings = start_data_bindings(
            &data_binding_registry,
            &configuration.spec.data_bindings,
            binding_start_concurrency,
        )
        .await
        .map_err(RuntimeError::ResourceBinding)?;

        let context = match Context::assemble(&configuration, &bindings, platform_resolver.as_ref())
        {
            Ok(context) => context,
            Err(e) => {
                warn!(
                    "Failed to assemble context for function '{}', stopping data bindings",
                    configuration.meta.name
                );
                if let Err(release) = stop_data_bindings(bindings).await {
                    warn!("Error while tearing down data bindings: {release:?}");
                }
                return Err(e);
            }
        };

        let control_message_broker = control_message_broker
            .unwrap_or_else(|| Arc::new(UnsupportedControlMessageBroker::new(&kind)));

        Ok(Self {
            kind,
            configuration,
            environment,
            status: RwLock::new(RuntimeStatus::Initializing),
            statistics: Statistics::new(),
            control_message_broker,
            data_bindings: Mutex::new(Some(bindings)),
            context,
            gate: EventGate::new(),
        })
    }

    /// `spec.runtime`, or the variant kind when unset.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn function_logger(&self) -> &FunctionLogger {
        &self.configuration.function_logger
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn control_message_broker(&self) -> Arc<dyn ControlMessageBroker> {
        self.control_message_broker.clone()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Variables exported to every process the backend spawns.
    pub fn environment(&self) -> &HashMap<String, String> {
        &self.environment
    }

    pub fn gate(&self) -> &EventGate {
        &self.gate
    }

    pub async fn status(&self) -> RuntimeStatus {
        *self.status.read().await
    }

    pub async fn set_status(&self, status: RuntimeStatus) {
        *self.status.write().await = status;
    }

    /// Set the status and log the change. Returns the previous status.
    pub async fn transition(&self, to: RuntimeStatus) -> RuntimeStatus {
        let mut status = self.status.write().await;
        let from = *status;
        *status = to;
        if from != to {
            info!(
                "Runtime '{}' of function '{}': {} -> {}",
                self.kind, self.configuration.meta.name, from, to
            );
        }
        from
    }

    /// Fail with `InvalidState` if `operation` is not allowed in the current status.
    pub async fn check(&self, operation: Operation) -> Result<RuntimeStatus> {
        let status = self.status().await;
        is_operation_valid(&status, &operation).map_err(RuntimeError::invalid_state)?;
        Ok(status)
    }

    /// Admit, time and record one event around `handler`.
    ///
    /// Refused events are counted as rejected and fail with `InvalidState`. The status is
    /// never changed here.
    pub async fn run_event<F, Fut>(&self, event: &Event, handler: F) -> Result<Response>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response>>,
    {
        let status = self.status().await;
        if let Err(reason) = is_operation_valid(&status, &Operation::ProcessEvent) {
            self.statistics.record_rejected();
            return Err(RuntimeError::invalid_state(format!(
                "event '{}' rejected: {}",
                event.id, reason
            )));
        }
        let Some(_permit) = self.gate.enter() else {
            self.statistics.record_rejected();
            return Err(RuntimeError::invalid_state(format!(
                "event '{}' rejected: runtime no longer accepts events",
                event.id
            )));
        };

        let span = tracing::info_span!(
            "runtime_event",
            function = %self.configuration.meta.name,
            worker_id = self.configuration.worker_id,
            event_id = %event.id
        );

        let started = Instant::now();
        let result = handler().instrument(span).await;
        self.statistics.record_event(started.elapsed(), result.is_ok());

        if let Err(e) = &result {
            debug!("Event '{}' failed: {e}", event.id);
        }
        result
    }

    /// Default start: no backend work.
    pub async fn start_common(&self) -> Result<()> {
        self.check(Operation::Start).await?;
        self.gate.open();
        self.transition(RuntimeStatus::Ready).await;
        Ok(())
    }

    /// Stop accepting events and wait for the admitted ones. Leaves status `Draining`.
    pub async fn begin_drain(&self) -> Result<()> {
        self.check(Operation::Drain).await?;
        self.transition(RuntimeStatus::Draining).await;
        self.gate.close();
        debug!(
            "Runtime '{}' waiting for {} in-flight events",
            self.kind,
            self.gate.in_flight()
        );
        self.gate.wait_idle().await;
        Ok(())
    }

    /// Default drain: nothing to flush beyond the in-flight events.
    pub async fn drain_common(&self) -> Result<()> {
        self.begin_drain().await?;
        self.transition(RuntimeStatus::Drained).await;
        Ok(())
    }

    /// Close the gate, stop the data bindings once and set status `Stopped`.
    ///
    /// Repeated calls succeed. A binding that fails to stop is reported as
    /// `ResourceRelease`, the instance is stopped regardless.
    pub async fn stop_common(&self) -> Result<()> {
        self.gate.close();

        let release = match self.data_bindings.lock().await.take() {
            Some(bindings) if !bindings.is_empty() => {
                info!(
                    "Stopping {} data bindings of function '{}'",
                    bindings.len(),
                    self.configuration.meta.name
                );
                stop_data_bindings(bindings).await
            }
            _ => Ok(()),
        };

        self.transition(RuntimeStatus::Stopped).await;
        release.map_err(RuntimeError::ResourceRelease)
    }
}

/// Function identity and `spec.env`. Identity variables override same-named entries.
fn build_environment(configuration: &Configuration) -> HashMap<String, String> {
    let mut environment = configuration.spec.env.clone();
    let spec = &configuration.spec;
    environment.insert(ENV_FUNCTION_NAME.to_string(), configuration.meta.name.clone());
    environment.insert(ENV_FUNCTION_DESCRIPTION.to_string(), spec.description.clone());
    environment.insert(ENV_FUNCTION_VERSION.to_string(), spec.version.to_string());
    environment.insert(ENV_FUNCTION_HANDLER.to_string(), spec.handler.clone());
    environment.insert(ENV_HANDLER.to_string(), spec.handler.clone());
    environment
}
