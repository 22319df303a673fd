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

//! Function logger handed to function code.
//!
//! Every message is emitted through the `log` facade under the [`FUNCTION_LOG_TARGET`]
//! target and also retained in a bounded per-logger history with a broadcast channel for
//! live tailing. Child loggers share the same channel.
//!
//! ```ignore
//! let logger = FunctionLogger::new("echo");
//! let (history, mut live) = logger.subscribe();
//! logger.info("handling event");
//! let message = live.recv().await?;
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default maximum number of log messages to retain per logger.
pub const DEFAULT_MAX_LOG_HISTORY: usize = 100;

/// Default broadcast channel capacity for live log streaming.
pub const DEFAULT_LOG_CHANNEL_CAPACITY: usize = 256;

/// `log` target used for function log records.
pub const FUNCTION_LOG_TARGET: &str = "function";

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse the level names wrappers report (`"warning"` is accepted for `Warn`).
    pub fn parse(level: &str) -> Option<Self> {
        match level.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn as_log_level(self) -> log::Level {
        match self {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A structured log message emitted by function code or a backend wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Name of the logger that emitted the message
    pub logger: String,
}

struct LogChannel {
    history: Mutex<VecDeque<LogMessage>>,
    max_history: usize,
    sender: broadcast::Sender<LogMessage>,
}

impl LogChannel {
    fn new(max_history: usize, channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            history: Mutex::new(VecDeque::with_capacity(max_history)),
            max_history,
            sender,
        }
    }

    fn push(&self, message: LogMessage) {
        if let Ok(mut history) = self.history.lock() {
            if history.len() >= self.max_history {
                history.pop_front();
            }
            history.push_back(message.clone());
        }
        // No live subscribers is fine
        let _ = self.sender.send(message);
    }

    fn history(&self) -> Vec<LogMessage> {
        self.history
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Logger handle given to function code and backends.
///
/// Cloning is cheap; clones and children share history and live stream.
#[derive(Clone)]
pub struct FunctionLogger {
    name: Arc<str>,
    channel: Arc<LogChannel>,
}

impl std::fmt::Debug for FunctionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionLogger")
            .field("name", &self.name)
            .field("max_history", &self.channel.max_history)
            .finish()
    }
}

impl Default for FunctionLogger {
    fn default() -> Self {
        Self::new("function")
    }
}

impl FunctionLogger {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self::with_capacity(name, DEFAULT_MAX_LOG_HISTORY, DEFAULT_LOG_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(name: impl AsRef<str>, max_history: usize, channel_capacity: usize) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            channel: Arc::new(LogChannel::new(max_history, channel_capacity)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Derive a named child logger sharing this logger's history and stream.
    pub fn child(&self, name: &str) -> Self {
        Self {
            name: Arc::from(format!("{}.{}", self.name, name)),
            channel: self.channel.clone(),
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        log::log!(
            target: FUNCTION_LOG_TARGET,
            level.as_log_level(),
            "[{}] {}",
            self.name,
            message
        );
        self.channel.push(LogMessage {
            timestamp: Utc::now(),
            level,
            message,
            logger: self.name.to_string(),
        });
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Recent messages, oldest first.
    pub fn history(&self) -> Vec<LogMessage> {
        self.channel.history()
    }

    /// Current history plus a receiver for messages logged from now on.
    pub fn subscribe(&self) -> (Vec<LogMessage>, broadcast::Receiver<LogMessage>) {
        let receiver = self.channel.sender.subscribe();
        (self.channel.history(), receiver)
    }
}
