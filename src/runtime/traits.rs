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

//! Runtime trait module
//!
//! This module provides the contract a worker's dispatcher and supervisor use to drive
//! a function runtime. Every runtime variant:
//! 1. Builds a `RuntimeBase` from `RuntimeBaseParams`
//! 2. Implements `base()` and `process_event()`
//! 3. Overrides the lifecycle capabilities its backend actually has
//!
//! Everything else (status, statistics, context, stop semantics) comes from the base
//! through the default methods.

use std::sync::Arc;

use async_trait::async_trait;

use super::base::RuntimeBase;
use crate::config::Configuration;
use crate::context::Context;
use crate::control::ControlMessageBroker;
use crate::error::{Result, RuntimeError};
use crate::event::{Event, Response};
use crate::logging::FunctionLogger;
use crate::statistics::Statistics;
use crate::status::RuntimeStatus;

/// Trait implemented by every runtime variant.
///
/// The dispatcher calls `process_event` for one event at a time. The supervisor may call
/// the lifecycle operations and read status or statistics concurrently with it.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// The shared lifecycle engine this runtime is composed over.
    fn base(&self) -> &RuntimeBase;

    /// Process exactly one event.
    ///
    /// A failure is returned to the caller and does not change the status. Events
    /// arriving during or after drain, or after stop, are rejected with `InvalidState`.
    async fn process_event(&self, event: Event, function_logger: &FunctionLogger)
        -> Result<Response>;

    /// Bring the backend to a processing-ready state and set status `Ready`.
    async fn start(&self) -> Result<()> {
        self.base().start_common().await
    }

    /// Stop accepting events, release data bindings and set status `Stopped`.
    ///
    /// Idempotent: calling it on a stopped runtime succeeds.
    async fn stop(&self) -> Result<()> {
        self.base().stop_common().await
    }

    /// Replace the backend. Unsupported unless the variant overrides it; the status is
    /// left unchanged.
    async fn restart(&self) -> Result<()> {
        Err(RuntimeError::unsupported(self.kind(), "restart"))
    }

    fn supports_restart(&self) -> bool {
        false
    }

    fn supports_control_communication(&self) -> bool {
        self.base().control_message_broker().is_supported()
    }

    /// Finish accepted events and refuse new ones.
    async fn drain(&self) -> Result<()> {
        self.base().drain_common().await
    }

    fn kind(&self) -> &str {
        self.base().kind()
    }

    async fn status(&self) -> RuntimeStatus {
        self.base().status().await
    }

    async fn set_status(&self, status: RuntimeStatus) {
        self.base().set_status(status).await
    }

    fn statistics(&self) -> &Statistics {
        self.base().statistics()
    }

    fn configuration(&self) -> &Configuration {
        self.base().configuration()
    }

    fn function_logger(&self) -> &FunctionLogger {
        self.base().function_logger()
    }

    fn control_message_broker(&self) -> Arc<dyn ControlMessageBroker> {
        self.base().control_message_broker()
    }

    fn context(&self) -> &Context {
        self.base().context()
    }
}
