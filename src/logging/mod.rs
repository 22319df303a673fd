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

//! Logging setup and the function logger.
//!
//! Library code logs through the `log` facade. Processes embedding the runtime call
//! [`init_logging`] once to route `log` records and `tracing` spans to a formatted
//! console subscriber filtered by `RUST_LOG` (default `info`).

mod function_log;

pub use function_log::{
    FunctionLogger, LogLevel, LogMessage, DEFAULT_LOG_CHANNEL_CAPACITY, DEFAULT_MAX_LOG_HISTORY,
    FUNCTION_LOG_TARGET,
};

/// Initialize logging with the default `info` filter.
///
/// Does nothing if a global subscriber was already installed.
pub fn init_logging() {
    let _ = try_init_logging_with_level("info");
}

/// Initialize logging, returning whether this call installed the subscriber.
pub fn try_init_logging() -> bool {
    try_init_logging_with_level("info")
}

/// Initialize logging with a default filter used when `RUST_LOG` is unset.
pub fn try_init_logging_with_level(default_filter: &str) -> bool {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    // Bridge log -> tracing, ignore if a logger is already set
    let _ = tracing_log::LogTracer::init();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_level(true));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
