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

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};

use super::{
    ControlMessage, ControlMessageBroker, ControlMessageKind, ControlMessageReceiver,
    ControlMessageSender, DEFAULT_CONTROL_CHANNEL_CAPACITY,
};
use crate::error::{Result, RuntimeError};

/// Control broker built on dedicated tokio channels.
///
/// The backend side takes the outbound receiver once via
/// [`take_outbound_receiver`](Self::take_outbound_receiver) and reports its own
/// messages through `publish()`. Publishing never waits on a consumer: a full consumer
/// channel loses that message (logged), a closed one is removed.
pub struct ChannelControlMessageBroker {
    capacity: usize,
    outbound_tx: ControlMessageSender,
    outbound_rx: Mutex<Option<ControlMessageReceiver>>,
    consumers: RwLock<HashMap<ControlMessageKind, Vec<ControlMessageSender>>>,
}

impl std::fmt::Debug for ChannelControlMessageBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelControlMessageBroker")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for ChannelControlMessageBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_CHANNEL_CAPACITY)
    }
}

impl ChannelControlMessageBroker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        Self {
            capacity,
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            consumers: RwLock::new(HashMap::new()),
        }
    }

    /// Receiver for messages written to the backend. Returns `None` after the first call.
    pub async fn take_outbound_receiver(&self) -> Option<ControlMessageReceiver> {
        self.outbound_rx.lock().await.take()
    }

    /// Number of live consumers registered for `kind`.
    pub async fn consumer_count(&self, kind: ControlMessageKind) -> usize {
        self.consumers
            .read()
            .await
            .get(&kind)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ControlMessageBroker for ChannelControlMessageBroker {
    fn is_supported(&self) -> bool {
        true
    }

    async fn write(&self, message: ControlMessage) -> Result<()> {
        debug!("Writing control message {:?} to backend", message.kind);
        self.outbound_tx.send(message).await.map_err(|e| {
            RuntimeError::Backend(anyhow!(
                "control channel to backend is closed, dropped {:?}",
                e.0.kind
            ))
        })
    }

    async fn subscribe(&self, kind: ControlMessageKind) -> Result<ControlMessageReceiver> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.consumers
            .write()
            .await
            .entry(kind)
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn unsubscribe(&self, kind: ControlMessageKind) -> Result<()> {
        self.consumers.write().await.remove(&kind);
        Ok(())
    }

    async fn publish(&self, message: ControlMessage) -> Result<usize> {
        let mut consumers = self.consumers.write().await;
        let Some(senders) = consumers.get_mut(&message.kind) else {
            debug!("No consumers for control message {:?}", message.kind);
            return Ok(0);
        };

        let mut delivered = 0;
        senders.retain(|tx| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Control consumer for {:?} is full, message not delivered",
                    message.kind
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        Ok(delivered)
    }
}
