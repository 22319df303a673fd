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

//! Runtime running a command per event.
//!
//! The handler names the command as `<script>[:<entrypoint>]`; only the script part is
//! executed. The event body is written to the command's stdin and its stdout becomes the
//! response body.
//!
//! ```yaml
//! spec:
//!   handler: /opt/functions/reverse.sh:main
//!   runtime: shell
//!   runtimeAttributes:
//!     arguments: --verbose --limit 10
//!     timeoutMillis: 5000
//! ```
//!
//! An `X-Nuclio-Arguments` event header replaces the configured arguments for that event.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::Configuration;
use crate::error::{Result, RuntimeError};
use crate::event::{Event, Response};
use crate::logging::FunctionLogger;
use crate::runtime::{Runtime, RuntimeBase, RuntimeBaseParams};

pub const SHELL_RUNTIME_KIND: &str = "shell";
pub const ARGUMENTS_HEADER: &str = "X-Nuclio-Arguments";
pub const DEFAULT_SHELL_TIMEOUT_MILLIS: u64 = 60_000;

pub struct ShellRuntime {
    base: RuntimeBase,
    command: String,
    arguments: Vec<String>,
    timeout: Duration,
}

impl ShellRuntime {
    pub async fn new(configuration: Configuration) -> Result<Self> {
        Self::with_params(RuntimeBaseParams::new(configuration)).await
    }

    pub async fn with_params(params: RuntimeBaseParams) -> Result<Self> {
        let configuration = &params.configuration;
        configuration.validate()?;

        let command = command_from_handler(&configuration.spec.handler).to_string();
        if command.is_empty() {
            return Err(RuntimeError::configuration(format!(
                "handler '{}' does not name a command",
                configuration.spec.handler
            )));
        }
        let arguments = configuration.runtime_attribute_list("arguments");
        let timeout = Duration::from_millis(
            configuration
                .runtime_attribute_u64("timeoutMillis")
                .unwrap_or(DEFAULT_SHELL_TIMEOUT_MILLIS),
        );

        let base = RuntimeBase::new(params.with_kind(SHELL_RUNTIME_KIND)).await?;
        Ok(Self {
            base,
            command,
            arguments,
            timeout,
        })
    }

    fn arguments_for(&self, event: &Event) -> Vec<String> {
        match event.header(ARGUMENTS_HEADER) {
            Some(arguments) => arguments.split_whitespace().map(str::to_string).collect(),
            None => self.arguments.clone(),
        }
    }

    async fn run_command(&self, event: &Event) -> Result<Response> {
        let arguments = self.arguments_for(event);
        debug!(
            "Running '{}' with {} arguments for event '{}'",
            self.command,
            arguments.len(),
            event.id
        );

        let mut child = Command::new(&self.command)
            .args(&arguments)
            .envs(self.base.environment())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to run command '{}'", self.command))
            .map_err(RuntimeError::EventProcessing)?;

        let stdin = child.stdin.take();
        let body = event.body.clone();
        let write_body = async move {
            if let Some(mut stdin) = stdin {
                // commands that ignore stdin may close it early
                let _ = stdin.write_all(&body).await;
            }
        };

        let run = async {
            let ((), output) = tokio::join!(write_body, child.wait_with_output());
            output
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                RuntimeError::EventProcessing(anyhow!(
                    "command '{}' timed out after {}ms",
                    self.command,
                    self.timeout.as_millis()
                ))
            })?
            .with_context(|| format!("failed to wait for command '{}'", self.command))
            .map_err(RuntimeError::EventProcessing)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RuntimeError::EventProcessing(anyhow!(
                "command '{}' failed ({}): {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(Response::new(output.stdout))
    }
}

/// `<script>[:<entrypoint>]` → `<script>`
fn command_from_handler(handler: &str) -> &str {
    handler
        .split_once(':')
        .map_or(handler, |(script, _)| script)
        .trim()
}

#[async_trait]
impl Runtime for ShellRuntime {
    fn base(&self) -> &RuntimeBase {
        &self.base
    }

    async fn process_event(
        &self,
        event: Event,
        _function_logger: &FunctionLogger,
    ) -> Result<Response> {
        self.base
            .run_event(&event, || self.run_command(&event))
            .await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::error::Error as _;

    use super::*;
    use crate::status::RuntimeStatus;
    use crate::test_support::helpers::test_fixtures::create_test_configuration;

    async fn shell(handler: &str, arguments: &str) -> ShellRuntime {
        let configuration = create_test_configuration("shell-fn")
            .with_handler(handler)
            .with_runtime(SHELL_RUNTIME_KIND)
            .with_runtime_attribute("arguments", arguments.into())
            .with_runtime_attribute("timeoutMillis", 2_000u64.into())
            .build();
        let runtime = ShellRuntime::new(configuration).await.unwrap();
        runtime.start().await.unwrap();
        runtime
    }

    async fn send(runtime: &ShellRuntime, event: Event) -> Result<Response> {
        let logger = runtime.function_logger().clone();
        runtime.process_event(event, &logger).await
    }

    #[test]
    fn test_command_from_handler() {
        assert_eq!(command_from_handler("reverse.sh:main"), "reverse.sh");
        assert_eq!(command_from_handler("cat"), "cat");
        assert_eq!(command_from_handler(":main"), "");
    }

    #[tokio::test]
    async fn test_body_goes_through_stdin() {
        let runtime = shell("cat", "").await;
        let response = send(&runtime, Event::new("hello shell")).await.unwrap();
        assert_eq!(response.body_str(), Some("hello shell"));
    }

    #[tokio::test]
    async fn test_handler_is_in_command_environment() {
        let runtime = shell("printenv:main", "NUCLIO_HANDLER").await;
        let response = send(&runtime, Event::new("")).await.unwrap();
        assert_eq!(response.body_str(), Some("printenv:main\n"));
    }

    #[tokio::test]
    async fn test_header_overrides_arguments() {
        let runtime = shell("echo", "a b").await;

        let response = send(&runtime, Event::new("")).await.unwrap();
        assert_eq!(response.body_str(), Some("a b\n"));

        let response = send(&runtime, Event::new("").with_header(ARGUMENTS_HEADER, "x y z"))
            .await
            .unwrap();
        assert_eq!(response.body_str(), Some("x y z\n"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "echo oops >&2\nexit 3\n").unwrap();

        let runtime = shell("sh", script.to_str().unwrap()).await;
        let err = send(&runtime, Event::new("")).await.unwrap_err();

        assert!(matches!(err, RuntimeError::EventProcessing(_)));
        let chain = crate::error::error_chain(&err).join(" / ");
        assert!(chain.contains("oops"), "{chain}");
        assert_eq!(runtime.status().await, RuntimeStatus::Ready);
        assert_eq!(runtime.statistics().snapshot().events_handled_failure, 1);
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let configuration = create_test_configuration("shell-fn")
            .with_handler("sleep")
            .with_runtime_attribute("arguments", "5".into())
            .with_runtime_attribute("timeoutMillis", 100u64.into())
            .build();
        let runtime = ShellRuntime::new(configuration).await.unwrap();

        let started = std::time::Instant::now();
        let err = send(&runtime, Event::new("")).await.unwrap_err();
        assert!(err.source().unwrap().to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_command_is_event_error() {
        let runtime = shell("/nonexistent/command", "").await;
        let err = send(&runtime, Event::new("")).await.unwrap_err();
        assert!(matches!(err, RuntimeError::EventProcessing(_)));
    }

    #[tokio::test]
    async fn test_restart_unsupported() {
        let runtime = shell("cat", "").await;
        assert!(!runtime.supports_restart());
        let err = runtime.restart().await.unwrap_err();
        assert_eq!(err.to_string(), "runtime shell does not support restart");
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let configuration = create_test_configuration("shell-fn")
            .with_handler(":main")
            .build();
        let err = ShellRuntime::new(configuration).await.err().unwrap();
        assert!(matches!(err, RuntimeError::Configuration { .. }));
    }
}
