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

//! All-or-nothing startup of a function's data bindings.
//!
//! Bindings are admitted in name order and started with bounded concurrency. Once any
//! unit fails, no further unit is admitted; units already admitted run to completion.
//! Every binding that did start is then stopped in reverse name order and the error of
//! the lowest-named failing binding is returned, so the outcome does not depend on which
//! unit happened to finish first.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use futures::future;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use super::{DataBinding, DataBindingRegistry};
use crate::config::DataBindingConfig;

/// Started bindings keyed by binding name.
pub type StartedDataBindings = BTreeMap<String, Arc<dyn DataBinding>>;

enum UnitOutcome {
    Started(Arc<dyn DataBinding>),
    Failed(anyhow::Error),
}

/// Start every configured binding or none of them.
///
/// `bindings` is keyed by binding name. `concurrency` is clamped to at least 1.
pub async fn start_data_bindings(
    registry: &DataBindingRegistry,
    bindings: &HashMap<String, DataBindingConfig>,
    concurrency: usize,
) -> Result<StartedDataBindings> {
    if bindings.is_empty() {
        return Ok(StartedDataBindings::new());
    }

    let mut entries: Vec<(String, DataBindingConfig)> = bindings
        .iter()
        .map(|(name, config)| (name.clone(), config.clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let limit = concurrency.max(1);
    debug!(
        "Starting {} data bindings with concurrency {}",
        entries.len(),
        limit
    );

    let abort = AtomicBool::new(false);
    let abort = &abort;

    let outcomes: Vec<(String, UnitOutcome)> = stream::iter(entries)
        .take_while(move |_| future::ready(!abort.load(Ordering::SeqCst)))
        .map(move |(name, config)| async move {
            match start_one(registry, &name, &config).await {
                Ok(binding) => (name, UnitOutcome::Started(binding)),
                Err(e) => {
                    abort.store(true, Ordering::SeqCst);
                    (name, UnitOutcome::Failed(e))
                }
            }
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    let mut started = StartedDataBindings::new();
    let mut failures: BTreeMap<String, anyhow::Error> = BTreeMap::new();
    for (name, outcome) in outcomes {
        match outcome {
            UnitOutcome::Started(binding) => {
                started.insert(name, binding);
            }
            UnitOutcome::Failed(e) => {
                failures.insert(name, e);
            }
        }
    }

    let Some((failed_name, error)) = failures.into_iter().next() else {
        info!("Started {} data bindings", started.len());
        return Ok(started);
    };

    warn!(
        "Data binding '{}' failed, stopping {} started bindings",
        failed_name,
        started.len()
    );
    if let Err(e) = stop_data_bindings(started).await {
        warn!("Error while tearing down data bindings: {e:?}");
    }
    Err(error)
}

async fn start_one(
    registry: &DataBindingRegistry,
    name: &str,
    config: &DataBindingConfig,
) -> Result<Arc<dyn DataBinding>> {
    let binding = registry
        .create(config)
        .with_context(|| format!("failed to create data binding '{name}'"))?;

    binding
        .start()
        .await
        .with_context(|| format!("failed to start data binding '{name}'"))?;

    debug!("Data binding '{}' of kind '{}' started", name, binding.kind());
    Ok(binding)
}

/// Stop bindings in reverse name order.
///
/// Every binding is asked to stop even if an earlier one fails; the first failure is
/// returned.
pub async fn stop_data_bindings(bindings: StartedDataBindings) -> Result<()> {
    let mut first_error = None;
    for (name, binding) in bindings.into_iter().rev() {
        match binding.stop().await {
            Ok(()) => debug!("Data binding '{name}' stopped"),
            Err(e) => {
                warn!("Failed to stop data binding '{name}': {e:?}");
                if first_error.is_none() {
                    first_error = Some(e.context(format!("failed to stop data binding '{name}'")));
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
