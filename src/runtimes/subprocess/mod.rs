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

//! Runtime backed by a wrapper process (interpreted languages).
//!
//! The wrapper is started with the scoped environment and speaks the JSON-lines
//! [`protocol`] over its stdin/stdout. It must print a `ready` line within the start
//! timeout. Log lines are forwarded to the function logger, control lines are
//! published on the runtime's control broker, stderr lines are logged as warnings.
//!
//! ```yaml
//! spec:
//!   handler: main:handler
//!   runtime: python:3.11
//!   runtimeAttributes:
//!     command: /opt/wrapper/run
//!     args: [--socket-less]
//!     startTimeoutMillis: 10000
//!     drainTimeoutMillis: 30000
//! ```
//!
//! Unlike the other variants this one supports restart (kill and respawn) and a real
//! drain: once in-flight events finish, a `drainRequest` is sent and the runtime waits
//! for the wrapper's `drainDone`.
//!
//! Wrappers should echo the event `id` as `eventId` on `response` and `error` lines.
//! Tagged replies for any other event are dropped. With untagged replies an event
//! abandoned by its caller leaves the wrapper unusable, so the next event terminates
//! it and the runtime moves to `Error`.

pub mod protocol;

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use self::protocol::WrapperMessage;
use crate::config::Configuration;
use crate::control::{
    ChannelControlMessageBroker, ControlMessage, ControlMessageBroker, ControlMessageKind,
    ControlMessageReceiver, DEFAULT_CONTROL_CHANNEL_CAPACITY,
};
use crate::error::{Result, RuntimeError};
use crate::event::{Event, Response};
use crate::logging::{FunctionLogger, LogLevel};
use crate::runtime::{Runtime, RuntimeBase, RuntimeBaseParams};
use crate::status::{Operation, RuntimeStatus};

/// Kind reported when `spec.runtime` is empty.
pub const SUBPROCESS_RUNTIME_KIND: &str = "subprocess";
pub const DEFAULT_START_TIMEOUT_MILLIS: u64 = 10_000;
pub const DEFAULT_DRAIN_TIMEOUT_MILLIS: u64 = 30_000;

const REPLY_CHANNEL_CAPACITY: usize = 16;
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct WrapperSettings {
    command: String,
    args: Vec<String>,
    start_timeout: Duration,
    drain_timeout: Duration,
}

impl WrapperSettings {
    fn from_configuration(configuration: &Configuration) -> Result<Self> {
        let command = configuration
            .runtime_attribute_str("command")
            .filter(|command| !command.trim().is_empty())
            .ok_or_else(|| {
                RuntimeError::configuration(format!(
                    "function '{}' requires runtimeAttributes.command",
                    configuration.meta.name
                ))
            })?
            .to_string();

        Ok(Self {
            command,
            args: configuration.runtime_attribute_list("args"),
            start_timeout: Duration::from_millis(
                configuration
                    .runtime_attribute_u64("startTimeoutMillis")
                    .unwrap_or(DEFAULT_START_TIMEOUT_MILLIS),
            ),
            drain_timeout: Duration::from_millis(
                configuration
                    .runtime_attribute_u64("drainTimeoutMillis")
                    .unwrap_or(DEFAULT_DRAIN_TIMEOUT_MILLIS),
            ),
        })
    }
}

/// What the reader task hands back to the event path.
#[derive(Debug)]
enum WrapperReply {
    Ready,
    Response {
        event_id: Option<String>,
        response: Response,
    },
    Error {
        event_id: Option<String>,
        message: String,
    },
}

struct WrapperProcess {
    child: Child,
    /// Set before an intentional kill so the reader does not report a crash
    exiting: Arc<AtomicBool>,
    /// Closed once the wrapper's stdout ends.
    exited: watch::Receiver<()>,
    reader: JoinHandle<()>,
    stderr: JoinHandle<()>,
}

/// Flags the wrapper as owing a reply unless the exchange completes.
struct PendingReply<'a> {
    abandoned: &'a AtomicBool,
    answered: bool,
}

impl<'a> PendingReply<'a> {
    fn new(abandoned: &'a AtomicBool) -> Self {
        Self {
            abandoned,
            answered: false,
        }
    }

    fn answer(mut self) {
        self.answered = true;
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        if !self.answered {
            self.abandoned.store(true, Ordering::SeqCst);
        }
    }
}

impl WrapperProcess {
    async fn shutdown(mut self) {
        self.exiting.store(true, Ordering::SeqCst);
        if let Err(e) = self.child.start_kill() {
            debug!("Wrapper process already gone: {e}");
        }
        if tokio::time::timeout(TERMINATE_TIMEOUT, self.child.wait())
            .await
            .is_err()
        {
            warn!("Wrapper process did not exit within {TERMINATE_TIMEOUT:?}");
        }
        self.reader.abort();
        self.stderr.abort();
    }
}

pub struct SubprocessRuntime {
    base: Arc<RuntimeBase>,
    broker: Arc<ChannelControlMessageBroker>,
    settings: WrapperSettings,
    process: Mutex<Option<WrapperProcess>>,
    /// Shared by the event path and the control forwarder; one whole line per lock.
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    replies: Mutex<Option<mpsc::Receiver<WrapperReply>>>,
    /// An exchange was dropped before its reply arrived.
    abandoned: AtomicBool,
    /// The wrapper tags its replies with `eventId`.
    correlated: AtomicBool,
    control_forwarder: JoinHandle<()>,
}

impl SubprocessRuntime {
    pub async fn new(configuration: Configuration) -> Result<Self> {
        Self::with_params(RuntimeBaseParams::new(configuration)).await
    }

    /// Construct with custom base parameters. Any control broker in `params` is
    /// replaced by the runtime's own channel broker.
    pub async fn with_params(params: RuntimeBaseParams) -> Result<Self> {
        params.configuration.validate()?;
        let settings = WrapperSettings::from_configuration(&params.configuration)?;

        let broker = Arc::new(ChannelControlMessageBroker::new(
            DEFAULT_CONTROL_CHANNEL_CAPACITY,
        ));
        let outbound = broker
            .take_outbound_receiver()
            .await
            .ok_or_else(|| anyhow!("control channel already taken"))?;

        let base = RuntimeBase::new(
            params
                .with_kind(SUBPROCESS_RUNTIME_KIND)
                .with_control_message_broker(broker.clone()),
        )
        .await?;

        let stdin = Arc::new(Mutex::new(None));
        let control_forwarder = tokio::spawn(forward_control(outbound, stdin.clone()));

        Ok(Self {
            base: Arc::new(base),
            broker,
            settings,
            process: Mutex::new(None),
            stdin,
            replies: Mutex::new(None),
            abandoned: AtomicBool::new(false),
            correlated: AtomicBool::new(false),
            control_forwarder,
        })
    }

    /// Whether a wrapper process is currently attached.
    pub async fn is_running(&self) -> bool {
        self.process.lock().await.is_some()
    }

    async fn launch(&self) -> Result<()> {
        info!(
            "Starting wrapper '{}' for function '{}'",
            self.settings.command,
            self.base.configuration().meta.name
        );

        let mut child = Command::new(&self.settings.command)
            .args(&self.settings.args)
            .envs(self.base.environment())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn wrapper '{}'", self.settings.command))
            .map_err(RuntimeError::Backend)?;

        let (stdin, stdout, stderr) = match (
            child.stdin.take(),
            child.stdout.take(),
            child.stderr.take(),
        ) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                let _ = child.start_kill();
                return Err(RuntimeError::Backend(anyhow!(
                    "wrapper '{}' started without piped stdio",
                    self.settings.command
                )));
            }
        };

        let (reply_tx, mut reply_rx) = mpsc::channel(REPLY_CHANNEL_CAPACITY);
        let exiting = Arc::new(AtomicBool::new(false));
        let (exit_tx, exited) = watch::channel(());
        let reader = tokio::spawn(read_wrapper_output(
            stdout,
            reply_tx,
            self.base.clone(),
            self.broker.clone(),
            exiting.clone(),
            exit_tx,
        ));
        let stderr = tokio::spawn(forward_stderr(
            stderr,
            self.base.function_logger().clone(),
        ));
        let process = WrapperProcess {
            child,
            exiting,
            exited,
            reader,
            stderr,
        };
        *self.stdin.lock().await = Some(stdin);

        let ready = tokio::time::timeout(self.settings.start_timeout, wait_ready(&mut reply_rx)).await;
        match ready {
            Ok(Ok(())) => {
                *self.process.lock().await = Some(process);
                *self.replies.lock().await = Some(reply_rx);
                debug!("Wrapper '{}' reported ready", self.settings.command);
                Ok(())
            }
            Ok(Err(e)) => {
                process.shutdown().await;
                *self.stdin.lock().await = None;
                Err(RuntimeError::Backend(e))
            }
            Err(_) => {
                process.shutdown().await;
                *self.stdin.lock().await = None;
                Err(RuntimeError::Backend(anyhow!(
                    "wrapper '{}' did not report ready within {}ms",
                    self.settings.command,
                    self.settings.start_timeout.as_millis()
                )))
            }
        }
    }

    /// Kill the current wrapper, if any. Events waiting for a reply fail.
    async fn terminate(&self) {
        let process = self.process.lock().await.take();
        if let Some(process) = process {
            debug!("Terminating wrapper '{}'", self.settings.command);
            process.shutdown().await;
        }
        *self.stdin.lock().await = None;
        *self.replies.lock().await = None;
        self.abandoned.store(false, Ordering::SeqCst);
        self.correlated.store(false, Ordering::SeqCst);
    }

    /// Spawn a fresh wrapper after `operation` was validated.
    async fn relaunch(&self) -> Result<()> {
        self.terminate().await;
        match self.launch().await {
            Ok(()) => {
                self.base.gate().open();
                self.base.transition(RuntimeStatus::Ready).await;
                Ok(())
            }
            Err(e) => {
                error!(
                    "Wrapper for function '{}' failed to start: {e:?}",
                    self.base.configuration().meta.name
                );
                self.base.transition(RuntimeStatus::Error).await;
                Err(e)
            }
        }
    }

    async fn exchange(&self, event: &Event) -> Result<Response> {
        let line = protocol::encode_event(event).map_err(RuntimeError::EventProcessing)?;

        let mut guard = self.replies.lock().await;
        let Some(replies) = guard.as_mut() else {
            return Err(RuntimeError::Backend(anyhow!("wrapper process is not running")));
        };
        let mut stale_replies = 0;
        while let Ok(stale) = replies.try_recv() {
            warn!("Dropping stale wrapper reply {stale:?}");
            stale_replies += 1;
        }
        let owes_reply = self.abandoned.swap(false, Ordering::SeqCst) && stale_replies == 0;
        if owes_reply && !self.correlated.load(Ordering::SeqCst) {
            drop(guard);
            return Err(self.discard_wrapper(event).await);
        }
        write_line(&self.stdin, &line)
            .await
            .map_err(RuntimeError::Backend)?;

        let pending = PendingReply::new(&self.abandoned);
        loop {
            match replies.recv().await {
                Some(WrapperReply::Response { event_id, response })
                    if self.answers(event, event_id.as_deref()) =>
                {
                    pending.answer();
                    return Ok(response);
                }
                Some(WrapperReply::Error { event_id, message })
                    if self.answers(event, event_id.as_deref()) =>
                {
                    pending.answer();
                    return Err(RuntimeError::EventProcessing(anyhow!(message)));
                }
                Some(WrapperReply::Ready) => debug!("Ignoring repeated ready from wrapper"),
                Some(other) => warn!(
                    "Dropping wrapper reply {other:?} while handling event '{}'",
                    event.id
                ),
                None => {
                    pending.answer();
                    return Err(RuntimeError::Backend(anyhow!(
                        "wrapper process exited while handling event '{}'",
                        event.id
                    )));
                }
            }
        }
    }

    /// Whether a reply tagged `reply_id` belongs to `event`.
    fn answers(&self, event: &Event, reply_id: Option<&str>) -> bool {
        match reply_id {
            Some(id) => {
                self.correlated.store(true, Ordering::SeqCst);
                id == event.id
            }
            None => true,
        }
    }

    /// A late untagged reply could be taken for `event`'s, so the wrapper goes.
    async fn discard_wrapper(&self, event: &Event) -> RuntimeError {
        error!(
            "Wrapper for function '{}' still owes a reply to an abandoned event, terminating it",
            self.base.configuration().meta.name
        );
        self.terminate().await;
        self.base.transition(RuntimeStatus::Error).await;
        RuntimeError::Backend(anyhow!(
            "event '{}' not sent: wrapper did not answer an abandoned event and does not tag replies with eventId",
            event.id
        ))
    }

    async fn wait_drain_done(
        &self,
        mut done: ControlMessageReceiver,
        mut exited: watch::Receiver<()>,
    ) -> Result<()> {
        tokio::select! {
            drained = tokio::time::timeout(self.settings.drain_timeout, done.recv()) => match drained {
                Ok(Some(_)) => Ok(()),
                Ok(None) => Err(RuntimeError::Backend(anyhow!(
                    "control channel closed before the wrapper finished draining"
                ))),
                Err(_) => Err(RuntimeError::Backend(anyhow!(
                    "wrapper did not finish draining within {}ms",
                    self.settings.drain_timeout.as_millis()
                ))),
            },
            _ = wait_exit(&mut exited) => Err(RuntimeError::Backend(anyhow!(
                "wrapper exited while draining"
            ))),
        }
    }
}

impl Drop for SubprocessRuntime {
    fn drop(&mut self) {
        self.control_forwarder.abort();
        if let Ok(mut process) = self.process.try_lock() {
            if let Some(process) = process.take() {
                process.exiting.store(true, Ordering::SeqCst);
                process.reader.abort();
                process.stderr.abort();
            }
        }
    }
}

#[async_trait]
impl Runtime for SubprocessRuntime {
    fn base(&self) -> &RuntimeBase {
        &self.base
    }

    async fn process_event(
        &self,
        event: Event,
        _function_logger: &FunctionLogger,
    ) -> Result<Response> {
        self.base
            .run_event(&event, || self.exchange(&event))
            .await
    }

    async fn start(&self) -> Result<()> {
        self.base.check(Operation::Start).await?;
        self.relaunch().await
    }

    async fn stop(&self) -> Result<()> {
        self.base.gate().close();
        self.terminate().await;
        self.base.stop_common().await
    }

    async fn restart(&self) -> Result<()> {
        self.base.check(Operation::Restart).await?;
        self.base.transition(RuntimeStatus::Restarting).await;
        self.base.gate().close();
        self.relaunch().await
    }

    fn supports_restart(&self) -> bool {
        true
    }

    fn supports_control_communication(&self) -> bool {
        true
    }

    async fn drain(&self) -> Result<()> {
        self.base.begin_drain().await?;

        let exited = self
            .process
            .lock()
            .await
            .as_ref()
            .map(|process| process.exited.clone());
        if let Some(exited) = exited {
            let done = self.broker.subscribe(ControlMessageKind::DrainDone).await?;
            self.broker
                .write(ControlMessage::new(ControlMessageKind::DrainRequest))
                .await?;
            if let Err(e) = self.wait_drain_done(done, exited).await {
                self.base.transition(RuntimeStatus::Error).await;
                return Err(e);
            }
        }

        self.base.transition(RuntimeStatus::Drained).await;
        Ok(())
    }
}

async fn write_line(stdin: &Mutex<Option<ChildStdin>>, line: &str) -> anyhow::Result<()> {
    let mut stdin = stdin.lock().await;
    let stdin = stdin
        .as_mut()
        .ok_or_else(|| anyhow!("wrapper process is not running"))?;
    stdin
        .write_all(line.as_bytes())
        .await
        .context("failed to write to wrapper")?;
    stdin.flush().await.context("failed to flush wrapper input")?;
    Ok(())
}

async fn forward_control(mut outbound: ControlMessageReceiver, stdin: Arc<Mutex<Option<ChildStdin>>>) {
    while let Some(message) = outbound.recv().await {
        let line = match protocol::encode_control(&message) {
            Ok(line) => line,
            Err(e) => {
                warn!("Dropping control message {:?}: {e:?}", message.kind);
                continue;
            }
        };
        if let Err(e) = write_line(&stdin, &line).await {
            warn!("Failed to forward control message {:?}: {e:?}", message.kind);
        }
    }
}

async fn wait_ready(replies: &mut mpsc::Receiver<WrapperReply>) -> anyhow::Result<()> {
    loop {
        match replies.recv().await {
            Some(WrapperReply::Ready) => return Ok(()),
            Some(other) => debug!("Ignoring {other:?} before ready"),
            None => return Err(anyhow!("wrapper exited before reporting ready")),
        }
    }
}

/// Resolves once the reader owning the sender has finished.
async fn wait_exit(exited: &mut watch::Receiver<()>) {
    while exited.changed().await.is_ok() {}
}

async fn read_wrapper_output(
    stdout: ChildStdout,
    replies: mpsc::Sender<WrapperReply>,
    base: Arc<RuntimeBase>,
    broker: Arc<ChannelControlMessageBroker>,
    exiting: Arc<AtomicBool>,
    _exit: watch::Sender<()>,
) {
    let logger = base.function_logger().clone();
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read wrapper output: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let message = match protocol::decode_line(&line) {
            Ok(message) => message,
            Err(_) => {
                // plain output from the function
                logger.info(line);
                continue;
            }
        };

        let reply = match message {
            WrapperMessage::Ready => WrapperReply::Ready,
            WrapperMessage::Response(mut wire) => {
                let event_id = wire.event_id.take();
                match wire.into_response() {
                    Ok(response) => WrapperReply::Response { event_id, response },
                    Err(e) => WrapperReply::Error {
                        event_id,
                        message: format!("{e:#}"),
                    },
                }
            }
            WrapperMessage::Error { event_id, message } => {
                WrapperReply::Error { event_id, message }
            }
            WrapperMessage::Log { level, message } => {
                logger.log(LogLevel::parse(&level).unwrap_or(LogLevel::Info), message);
                continue;
            }
            WrapperMessage::Control(message) => {
                if let Err(e) = broker.publish(message).await {
                    warn!("Failed to publish wrapper control message: {e}");
                }
                continue;
            }
        };

        if let Err(TrySendError::Full(reply)) = replies.try_send(reply) {
            warn!("Dropping unexpected wrapper reply {reply:?}");
        }
    }

    if exiting.load(Ordering::SeqCst) {
        return;
    }
    let status = base.status().await;
    if matches!(
        status,
        RuntimeStatus::Ready | RuntimeStatus::Draining | RuntimeStatus::Drained
    ) {
        error!(
            "Wrapper process of function '{}' exited unexpectedly",
            base.configuration().meta.name
        );
        base.transition(RuntimeStatus::Error).await;
    }
}

async fn forward_stderr(stderr: ChildStderr, logger: FunctionLogger) {
    let logger = logger.child("stderr");
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            logger.warn(line);
        }
    }
}
