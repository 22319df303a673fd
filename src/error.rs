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

//! Error types for processor-runtime operations.
//!
//! This module provides structured error types using `thiserror`:
//! - Public API returns `crate::error::Result<T>` with structured `RuntimeError` variants
//! - Plugin seams (data binding factories, binding start) use `anyhow::Result<T>`
//! - Wrapping layers keep the inner error as `#[source]`, so the whole causal chain
//!   is reachable through `std::error::Error::source`
//!
//! # Example
//!
//! ```ignore
//! use processor_runtime::error::{RuntimeError, Result};
//!
//! match runtime.restart().await {
//!     Err(RuntimeError::UnsupportedOperation { runtime_kind, .. }) => {
//!         println!("{} cannot restart, recreating instead", runtime_kind);
//!     }
//!     Err(e) => return Err(e),
//!     Ok(()) => {}
//! }
//! ```

use thiserror::Error;

/// Main error type for runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Missing or invalid configuration (handler, binding kind, runtime attributes).
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
    },

    /// A data binding could not be constructed or started.
    #[error("failed to create data bindings")]
    ResourceBinding(#[source] anyhow::Error),

    /// A started data binding could not produce its context object.
    #[error("failed to create context")]
    ContextAssembly(#[source] anyhow::Error),

    /// The platform handle could not be resolved.
    #[error("failed to resolve platform '{kind}' in namespace '{namespace}': {reason}")]
    PlatformResolution {
        /// Platform kind from the configuration
        kind: String,
        /// Function namespace
        namespace: String,
        /// Why resolution failed
        reason: String,
    },

    /// The operation is not provided by this runtime variant.
    #[error("runtime {runtime_kind} does not support {operation}")]
    UnsupportedOperation {
        /// The runtime kind (e.g. "shell", "python:3.11")
        runtime_kind: String,
        /// The operation that was requested
        operation: String,
    },

    /// Operation is not valid in the current status.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the state error
        message: String,
    },

    /// The function failed while handling an event.
    #[error("failed to process event")]
    EventProcessing(#[source] anyhow::Error),

    /// The execution backend (process, wrapper) failed.
    #[error("runtime backend failure")]
    Backend(#[source] anyhow::Error),

    /// Releasing resources during stop failed. The instance is still stopped.
    #[error("failed to release runtime resources")]
    ResourceRelease(#[source] anyhow::Error),

    /// Internal error - wraps underlying errors while preserving the error chain.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RuntimeError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        RuntimeError::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error naming the runtime kind.
    ///
    /// # Example
    /// ```ignore
    /// RuntimeError::unsupported("shell", "restart")
    /// ```
    pub fn unsupported(runtime_kind: impl Into<String>, operation: impl Into<String>) -> Self {
        RuntimeError::UnsupportedOperation {
            runtime_kind: runtime_kind.into(),
            operation: operation.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        RuntimeError::InvalidState {
            message: message.into(),
        }
    }

    /// Create a platform resolution error.
    pub fn platform_resolution(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RuntimeError::PlatformResolution {
            kind: kind.into(),
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors raised while constructing a runtime instance.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            RuntimeError::Configuration { .. }
                | RuntimeError::ResourceBinding(_)
                | RuntimeError::ContextAssembly(_)
                | RuntimeError::PlatformResolution { .. }
        )
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Render an error and all of its sources, outermost first.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut current = error.source();
    while let Some(cause) = current {
        chain.push(cause.to_string());
        current = cause.source();
    }
    chain
}
