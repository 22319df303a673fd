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

//! Data bindings: external resources (caches, queues, stores) a function declares in its
//! configuration and receives, already connected, through its [`Context`](crate::context::Context).
//!
//! A binding kind is resolved through a [`DataBindingRegistry`]; the runtime starts every
//! declared binding through [`start_data_bindings`] before the instance exists, and stops
//! them again through [`stop_data_bindings`].

pub mod memory;
mod registry;
mod startup;

#[cfg(test)]
mod tests;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

pub use memory::{MemoryDataBinding, MemoryStore, MEMORY_BINDING_KIND};
pub use registry::{DataBindingFactory, DataBindingRegistry};
pub use startup::{start_data_bindings, stop_data_bindings, StartedDataBindings};

/// Default number of bindings started at the same time.
pub const DEFAULT_BINDING_START_CONCURRENCY: usize = 4;

/// Opaque handle a binding exposes to function code. Retrieve it with
/// [`Context::data_binding`](crate::context::Context::data_binding).
pub type ContextObject = Arc<dyn Any + Send + Sync>;

/// A connected external resource.
///
/// Lifecycle: `start()` → `context_object()` → `stop()`. The runtime calls `stop()` when
/// the instance stops, or during construction if another binding fails.
#[async_trait]
pub trait DataBinding: Send + Sync {
    /// Binding name as declared in the configuration.
    fn name(&self) -> &str;

    /// Normalized binding kind.
    fn kind(&self) -> &str;

    /// Connect to the resource.
    async fn start(&self) -> anyhow::Result<()>;

    /// The object handed to function code. Only called after a successful `start()`.
    fn context_object(&self) -> anyhow::Result<ContextObject>;

    /// Release the resource.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
