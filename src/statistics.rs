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

//! Runtime statistics.
//!
//! The owning runtime instance is the only writer. Monitors read concurrently through
//! [`Statistics::snapshot`] and compute rates with [`StatisticsSnapshot::diff_from`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters accumulated by a runtime instance.
#[derive(Debug, Default)]
pub struct Statistics {
    events_handled_success: AtomicU64,
    events_handled_failure: AtomicU64,
    events_rejected: AtomicU64,
    duration_millis_sum: AtomicU64,
    duration_millis_count: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one handled event and how long the handler took.
    pub fn record_event(&self, duration: Duration, success: bool) {
        if success {
            self.events_handled_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_handled_failure.fetch_add(1, Ordering::Relaxed);
        }
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.duration_millis_sum.fetch_add(millis, Ordering::Relaxed);
        self.duration_millis_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event that was refused before reaching the handler.
    pub fn record_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            events_handled_success: self.events_handled_success.load(Ordering::Relaxed),
            events_handled_failure: self.events_handled_failure.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            duration_millis_sum: self.duration_millis_sum.load(Ordering::Relaxed),
            duration_millis_count: self.duration_millis_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub events_handled_success: u64,
    pub events_handled_failure: u64,
    pub events_rejected: u64,
    pub duration_millis_sum: u64,
    pub duration_millis_count: u64,
}

impl StatisticsSnapshot {
    /// Counters accumulated since `previous` was taken.
    pub fn diff_from(&self, previous: &StatisticsSnapshot) -> StatisticsSnapshot {
        StatisticsSnapshot {
            events_handled_success: self
                .events_handled_success
                .saturating_sub(previous.events_handled_success),
            events_handled_failure: self
                .events_handled_failure
                .saturating_sub(previous.events_handled_failure),
            events_rejected: self.events_rejected.saturating_sub(previous.events_rejected),
            duration_millis_sum: self
                .duration_millis_sum
                .saturating_sub(previous.duration_millis_sum),
            duration_millis_count: self
                .duration_millis_count
                .saturating_sub(previous.duration_millis_count),
        }
    }

    pub fn events_handled(&self) -> u64 {
        self.events_handled_success + self.events_handled_failure
    }

    /// Mean handler duration, `None` before the first event.
    pub fn average_duration(&self) -> Option<Duration> {
        if self.duration_millis_count == 0 {
            return None;
        }
        Some(Duration::from_millis(
            self.duration_millis_sum / self.duration_millis_count,
        ))
    }
}
