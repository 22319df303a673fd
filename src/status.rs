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

use serde::{Deserialize, Serialize};

/// `RuntimeStatus` is the reported lifecycle state of a runtime instance.
///
/// # Status Lifecycle
///
/// ```text
/// (construct) → Initializing → Ready → Draining → Drained
///                    ↑           ↓  ↑                 │
///                    │      Restarting                │
///                    │           ↓                    │
///                    └──────── Error ←────────────────┘
///
/// any → Stopped (stop is always allowed)
/// ```
///
/// Transitions are explicit. They happen only when the supervisor calls a lifecycle
/// operation or `set_status()`, never as a side effect of handling an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RuntimeStatus {
    Initializing,
    Ready,
    Draining,
    Drained,
    Restarting,
    Stopped,
    Error,
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RuntimeStatus::Initializing => "initializing",
            RuntimeStatus::Ready => "ready",
            RuntimeStatus::Draining => "draining",
            RuntimeStatus::Drained => "drained",
            RuntimeStatus::Restarting => "restarting",
            RuntimeStatus::Stopped => "stopped",
            RuntimeStatus::Error => "error",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    ProcessEvent,
    Drain,
    Restart,
    Stop,
}

pub fn is_operation_valid(status: &RuntimeStatus, operation: &Operation) -> Result<(), String> {
    match (status, operation) {
        // Stop is idempotent and always allowed
        (_, Operation::Stop) => Ok(()),

        // Initializing: freshly constructed, the backend has not been started yet
        (RuntimeStatus::Initializing, Operation::Start) => Ok(()),
        (RuntimeStatus::Initializing, Operation::ProcessEvent) => Ok(()),
        (RuntimeStatus::Initializing, Operation::Drain) => Ok(()),
        (RuntimeStatus::Initializing, Operation::Restart) => {
            Err("Cannot restart a runtime that was never started".to_string())
        }

        // Ready: processing events
        (RuntimeStatus::Ready, Operation::Start) => Err("Runtime is already ready".to_string()),
        (RuntimeStatus::Ready, Operation::ProcessEvent) => Ok(()),
        (RuntimeStatus::Ready, Operation::Drain) => Ok(()),
        (RuntimeStatus::Ready, Operation::Restart) => Ok(()),

        // Draining: waiting for in-flight events, nothing else may start
        (RuntimeStatus::Draining, Operation::Start) => {
            Err("Cannot start a runtime while it is draining".to_string())
        }
        (RuntimeStatus::Draining, Operation::ProcessEvent) => {
            Err("Runtime is draining and no longer accepts events".to_string())
        }
        (RuntimeStatus::Draining, Operation::Drain) => {
            Err("Runtime is already draining".to_string())
        }
        (RuntimeStatus::Draining, Operation::Restart) => {
            Err("Cannot restart a runtime while it is draining".to_string())
        }

        // Drained: no events accepted until started or restarted again
        (RuntimeStatus::Drained, Operation::Start) => Ok(()),
        (RuntimeStatus::Drained, Operation::ProcessEvent) => {
            Err("Runtime is drained and no longer accepts events".to_string())
        }
        (RuntimeStatus::Drained, Operation::Drain) => Ok(()),
        (RuntimeStatus::Drained, Operation::Restart) => Ok(()),

        // Restarting: backend is being replaced
        (RuntimeStatus::Restarting, Operation::Start) => {
            Err("Cannot start a runtime while it is restarting".to_string())
        }
        (RuntimeStatus::Restarting, Operation::ProcessEvent) => {
            Err("Runtime is restarting".to_string())
        }
        (RuntimeStatus::Restarting, Operation::Drain) => {
            Err("Cannot drain a runtime while it is restarting".to_string())
        }
        (RuntimeStatus::Restarting, Operation::Restart) => {
            Err("Runtime is already restarting".to_string())
        }

        // Stopped: final, bindings are released
        (RuntimeStatus::Stopped, Operation::Start) => {
            Err("Cannot start a stopped runtime, create a new instance".to_string())
        }
        (RuntimeStatus::Stopped, Operation::ProcessEvent) => {
            Err("Runtime is stopped".to_string())
        }
        (RuntimeStatus::Stopped, Operation::Drain) => {
            Err("Cannot drain a stopped runtime".to_string())
        }
        (RuntimeStatus::Stopped, Operation::Restart) => {
            Err("Cannot restart a stopped runtime".to_string())
        }

        // Error: recovery through start or restart
        (RuntimeStatus::Error, Operation::Start) => Ok(()),
        (RuntimeStatus::Error, Operation::ProcessEvent) => {
            Err("Runtime is in error state".to_string())
        }
        (RuntimeStatus::Error, Operation::Drain) => {
            Err("Cannot drain a runtime in error state".to_string())
        }
        (RuntimeStatus::Error, Operation::Restart) => Ok(()),
    }
}

pub fn get_allowed_operations(status: &RuntimeStatus) -> Vec<&'static str> {
    match status {
        RuntimeStatus::Initializing => vec!["start", "process_event", "drain", "stop"],
        RuntimeStatus::Ready => vec!["process_event", "drain", "restart", "stop"],
        RuntimeStatus::Draining => vec!["stop"],
        RuntimeStatus::Drained => vec!["start", "drain", "restart", "stop"],
        RuntimeStatus::Restarting => vec!["stop"],
        RuntimeStatus::Stopped => vec!["stop"],
        RuntimeStatus::Error => vec!["start", "restart", "stop"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RuntimeStatus; 7] = [
        RuntimeStatus::Initializing,
        RuntimeStatus::Ready,
        RuntimeStatus::Draining,
        RuntimeStatus::Drained,
        RuntimeStatus::Restarting,
        RuntimeStatus::Stopped,
        RuntimeStatus::Error,
    ];

    #[test]
    fn test_stop_allowed_from_every_status() {
        for status in ALL {
            assert!(is_operation_valid(&status, &Operation::Stop).is_ok());
        }
    }

    #[test]
    fn test_allowed_operations_agree_with_table() {
        let ops = [
            ("start", Operation::Start),
            ("process_event", Operation::ProcessEvent),
            ("drain", Operation::Drain),
            ("restart", Operation::Restart),
            ("stop", Operation::Stop),
        ];
        for status in ALL {
            let allowed = get_allowed_operations(&status);
            for (name, op) in &ops {
                assert_eq!(
                    allowed.contains(name),
                    is_operation_valid(&status, op).is_ok(),
                    "{status} / {name}"
                );
            }
        }
    }

    #[test]
    fn test_ready_rejects_second_start() {
        let err = is_operation_valid(&RuntimeStatus::Ready, &Operation::Start).unwrap_err();
        assert!(err.contains("already ready"));
    }

    #[test]
    fn test_stopped_is_final() {
        assert_eq!(get_allowed_operations(&RuntimeStatus::Stopped), vec!["stop"]);
        assert!(is_operation_valid(&RuntimeStatus::Stopped, &Operation::Start).is_err());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let json = serde_json::to_string(&RuntimeStatus::Initializing).unwrap();
        assert_eq!(json, "\"initializing\"");
    }
}
