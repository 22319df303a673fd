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

//! Control message broker.
//!
//! Control-plane messages (drain requests, acknowledgements, health probes) travel on
//! channels of their own, never on the event path, so a backlog of events cannot delay
//! them and they are never interleaved with event payloads.
//!
//! Two directions:
//! - `write()`: runtime → backend (e.g. ask a wrapper process to drain)
//! - `publish()` / `subscribe()`: backend → interested consumers (e.g. a trigger waiting
//!   for stream acknowledgements)
//!
//! Callers check [`ControlMessageBroker::is_supported`] (or the runtime's
//! `supports_control_communication()`) before relying on delivery. The unsupported
//! broker answers every operation with `RuntimeError::UnsupportedOperation`.

mod channel;

pub use channel::ChannelControlMessageBroker;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Result, RuntimeError};

/// Default capacity of each control channel.
pub const DEFAULT_CONTROL_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlMessageKind {
    /// Backend acknowledges processing of stream messages up to an offset.
    StreamMessageAck,
    /// Ask the backend to finish its accumulated events.
    DrainRequest,
    /// Backend finished draining.
    DrainDone,
    HealthProbe,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub kind: ControlMessageKind,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ControlMessage {
    pub fn new(kind: ControlMessageKind) -> Self {
        Self {
            kind,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

pub type ControlMessageReceiver = mpsc::Receiver<ControlMessage>;
pub type ControlMessageSender = mpsc::Sender<ControlMessage>;

#[async_trait]
pub trait ControlMessageBroker: Send + Sync {
    /// Whether messages sent through this broker are actually delivered.
    fn is_supported(&self) -> bool;

    /// Send a message from the runtime to its backend.
    async fn write(&self, message: ControlMessage) -> Result<()>;

    /// Receive every message of `kind` the backend publishes from now on.
    async fn subscribe(&self, kind: ControlMessageKind) -> Result<ControlMessageReceiver>;

    /// Drop all consumers of `kind`.
    async fn unsubscribe(&self, kind: ControlMessageKind) -> Result<()>;

    /// Deliver a backend message to its consumers. Returns how many received it.
    async fn publish(&self, message: ControlMessage) -> Result<usize>;
}

/// Broker for runtimes without a control channel.
#[derive(Debug, Clone)]
pub struct UnsupportedControlMessageBroker {
    runtime_kind: String,
}

impl UnsupportedControlMessageBroker {
    pub fn new(runtime_kind: impl Into<String>) -> Self {
        Self {
            runtime_kind: runtime_kind.into(),
        }
    }

    fn unsupported(&self) -> RuntimeError {
        RuntimeError::unsupported(&self.runtime_kind, "control communication")
    }
}

#[async_trait]
impl ControlMessageBroker for UnsupportedControlMessageBroker {
    fn is_supported(&self) -> bool {
        false
    }

    async fn write(&self, _message: ControlMessage) -> Result<()> {
        Err(self.unsupported())
    }

    async fn subscribe(&self, _kind: ControlMessageKind) -> Result<ControlMessageReceiver> {
        Err(self.unsupported())
    }

    async fn unsubscribe(&self, _kind: ControlMessageKind) -> Result<()> {
        Err(self.unsupported())
    }

    async fn publish(&self, _message: ControlMessage) -> Result<usize> {
        Err(self.unsupported())
    }
}
