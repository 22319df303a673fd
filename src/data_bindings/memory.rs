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

//! In-memory key/value data binding.
//!
//! Useful for local runs and tests. Data lives as long as the binding and is cleared on
//! stop. String values under the `seed` attribute are loaded when the binding starts:
//!
//! ```yaml
//! dataBindings:
//!   cache:
//!     kind: memory
//!     attributes:
//!       seed:
//!         greeting: hello
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

use super::{ContextObject, DataBinding};
use crate::config::DataBindingConfig;

pub const MEMORY_BINDING_KIND: &str = "memory";

/// Key/value store exposed to function code as the binding's context object.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.write().await.insert(key.into(), value.into());
    }

    /// Returns whether the key existed.
    pub async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

pub struct MemoryDataBinding {
    name: String,
    kind: String,
    seed: HashMap<String, String>,
    store: Arc<MemoryStore>,
    started: AtomicBool,
}

impl MemoryDataBinding {
    pub fn from_config(config: &DataBindingConfig) -> Self {
        let seed = config
            .attributes
            .get("seed")
            .and_then(|value| value.as_object())
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(key, value)| {
                        value.as_str().map(|value| (key.clone(), value.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: config.name.clone(),
            kind: config.kind.clone(),
            seed,
            store: Arc::new(MemoryStore::new()),
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DataBinding for MemoryDataBinding {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    async fn start(&self) -> anyhow::Result<()> {
        for (key, value) in &self.seed {
            self.store.set(key.clone(), value.as_bytes().to_vec()).await;
        }
        self.started.store(true, Ordering::SeqCst);
        debug!(
            "Memory data binding '{}' started with {} seeded entries",
            self.name,
            self.seed.len()
        );
        Ok(())
    }

    fn context_object(&self) -> anyhow::Result<ContextObject> {
        if !self.started.load(Ordering::SeqCst) {
            bail!("memory data binding '{}' is not started", self.name);
        }
        Ok(self.store.clone() as ContextObject)
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.started.store(false, Ordering::SeqCst);
        self.store.clear().await;
        Ok(())
    }
}
