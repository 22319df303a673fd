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

// ============================================================================
// Core Public Modules
// ============================================================================

/// Function configuration, YAML loading and the fluent builder
pub mod config;
/// Read-only context handed to function code
pub mod context;
/// Out-of-band control messages between a runtime and its backend
pub mod control;
/// External resource connectors exposed through the context
pub mod data_bindings;
/// Error types for the runtime layer
pub mod error;
pub mod event;
/// Logging initialization and the function logger
pub mod logging;
/// Deployment platform handles
pub mod platform;
/// The runtime contract and its shared lifecycle engine
pub mod runtime;
/// Runtime variants and the registry selecting them
pub mod runtimes;
pub mod statistics;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

// ============================================================================
// Clean Public API
// ============================================================================

/// The contract every runtime variant implements
///
/// # Examples
///
/// ```no_run
/// use processor_runtime::{Configuration, Event, Runtime, ShellRuntime};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let configuration = Configuration::builder("reverse")
///     .with_handler("rev")
///     .with_runtime("shell")
///     .build();
///
/// let runtime = ShellRuntime::new(configuration).await?;
/// runtime.start().await?;
///
/// let logger = runtime.function_logger().clone();
/// let response = runtime.process_event(Event::new("hello"), &logger).await?;
/// assert_eq!(response.body_str(), Some("olleh\n"));
/// # Ok(())
/// # }
/// ```
pub use runtime::Runtime;
pub use runtime::{RuntimeBase, RuntimeBaseParams};

/// Error types
pub use error::{Result, RuntimeError};

/// Lifecycle status and the operation table
pub use status::{get_allowed_operations, is_operation_valid, Operation, RuntimeStatus};
pub use statistics::{Statistics, StatisticsSnapshot};

pub use event::{Event, Response};
pub use context::Context;

/// Logging initialization functions - call before any other logger setup
pub use logging::{
    init_logging, try_init_logging, try_init_logging_with_level, FunctionLogger, LogLevel,
    LogMessage,
};

// ============================================================================
// Configuration Types
// ============================================================================

pub use config::{
    Configuration, ConfigurationBuilder, DataBindingConfig, FunctionMeta, FunctionSpec,
    PlatformConfig,
};

// ============================================================================
// Plugin Traits and Variants
// ============================================================================

/// Data binding trait and registry for implementing binding kinds
pub use data_bindings::{ContextObject, DataBinding, DataBindingRegistry};
/// Control broker trait and implementations
pub use control::{
    ChannelControlMessageBroker, ControlMessage, ControlMessageBroker, ControlMessageKind,
    UnsupportedControlMessageBroker,
};
/// Platform resolution
pub use platform::{DefaultPlatformResolver, Platform, PlatformResolver};
/// Runtime variants
pub use runtimes::{
    HandlerRegistry, InProcessRuntime, RuntimeRegistry, ShellRuntime, SubprocessRuntime,
};
