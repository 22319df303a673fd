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

//! # Runtime Lifecycle Integration Test
//!
//! Drives runtimes through the public API the way a worker does:
//! 1. Load a function configuration from YAML
//! 2. Create the runtime named by `spec.runtime` through the registry
//! 3. Start, process events, drain and stop
//! 4. Read status and statistics as a monitor would

use std::sync::Arc;

use anyhow::Result;
use processor_runtime::data_bindings::MemoryStore;
use processor_runtime::{
    Configuration, ControlMessage, ControlMessageKind, Event, HandlerRegistry, Response,
    Runtime, RuntimeBaseParams, RuntimeError, RuntimeRegistry, RuntimeStatus,
};
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};

const COUNTER_FUNCTION: &str = r#"
meta:
  name: counter
  namespace: default
spec:
  handler: main:count
  runtime: rust
  version: 2
  dataBindings:
    store:
      class: memory
      attributes:
        seed:
          count: "40"
workerId: 3
triggerKind: http
triggerName: default-http
"#;

fn counter_handlers() -> HandlerRegistry {
    let mut handlers = HandlerRegistry::new();
    handlers.register("count", |context, event: Event, logger| async move {
        let store = context
            .data_binding::<MemoryStore>("store")
            .ok_or_else(|| anyhow::anyhow!("store binding missing"))?;

        let current: u64 = match store.get("count").await {
            Some(value) => String::from_utf8(value)?.parse()?,
            None => 0,
        };
        let increment: u64 = event.body_str().unwrap_or("1").parse().unwrap_or(1);
        let next = current + increment;
        store.set("count", next.to_string()).await;

        logger.info(format!("worker {} counted {}", context.worker_id(), next));
        Ok(Response::new(next.to_string())
            .with_header("X-Worker", context.worker_id().to_string()))
    });
    handlers
}

#[tokio::test]
async fn test_yaml_function_through_registry() -> Result<()> {
    let configuration = Configuration::from_yaml_str(COUNTER_FUNCTION)?;
    let registry = RuntimeRegistry::with_builtin_kinds(counter_handlers());

    let runtime = registry.create(RuntimeBaseParams::new(configuration)).await?;
    assert_eq!(runtime.status().await, RuntimeStatus::Initializing);
    assert_eq!(runtime.context().function_version(), 2);
    assert_eq!(runtime.context().trigger_name(), "default-http");
    assert_eq!(runtime.context().data_bindings().len(), 1);

    runtime.start().await?;

    let logger = runtime.function_logger().clone();
    let response = runtime.process_event(Event::new("1"), &logger).await?;
    assert_eq!(response.body_str(), Some("41"));
    assert_eq!(response.headers.get("X-Worker").map(String::as_str), Some("3"));

    let response = runtime.process_event(Event::new("9"), &logger).await?;
    assert_eq!(response.body_str(), Some("50"));

    let snapshot = runtime.statistics().snapshot();
    assert_eq!(snapshot.events_handled_success, 2);
    assert_eq!(snapshot.events_handled_failure, 0);
    assert_eq!(snapshot.duration_millis_count, 2);

    let history = logger.history();
    assert!(history.iter().any(|m| m.message == "worker 3 counted 50"));

    runtime.stop().await?;
    assert_eq!(runtime.status().await, RuntimeStatus::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_handler_failure_keeps_runtime_ready() -> Result<()> {
    let configuration = Configuration::from_yaml_str(COUNTER_FUNCTION)?;
    let registry = RuntimeRegistry::with_builtin_kinds(counter_handlers());
    let runtime = registry.create(RuntimeBaseParams::new(configuration)).await?;
    runtime.start().await?;

    // a non-numeric count in the store makes the handler fail
    let store = runtime
        .context()
        .data_binding::<MemoryStore>("store")
        .expect("store binding");
    store.set("count", "forty").await;

    let logger = runtime.function_logger().clone();
    let err = runtime
        .process_event(Event::new("1"), &logger)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::EventProcessing(_)));
    assert_eq!(runtime.status().await, RuntimeStatus::Ready);
    assert_eq!(runtime.statistics().snapshot().events_handled_failure, 1);

    runtime.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_drain_waits_for_in_flight_event() -> Result<()> {
    let release = Arc::new(Semaphore::new(0));
    let entered = Arc::new(Semaphore::new(0));

    let mut handlers = HandlerRegistry::new();
    {
        let release = release.clone();
        let entered = entered.clone();
        handlers.register("slow", move |_context, _event: Event, _logger| {
            let release = release.clone();
            let entered = entered.clone();
            async move {
                entered.add_permits(1);
                if let Ok(permit) = release.acquire().await {
                    permit.forget();
                }
                Ok(Response::new("done"))
            }
        });
    }

    let configuration = Configuration::builder("slow")
        .with_handler("slow")
        .with_runtime("rust")
        .build();
    let runtime: Arc<dyn Runtime> = Arc::from(
        RuntimeRegistry::with_builtin_kinds(handlers)
            .create(RuntimeBaseParams::new(configuration))
            .await?,
    );
    runtime.start().await?;

    let in_flight = {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            let logger = runtime.function_logger().clone();
            runtime.process_event(Event::new(""), &logger).await
        })
    };
    if let Ok(permit) = entered.acquire().await {
        permit.forget();
    }

    let draining = {
        let runtime = runtime.clone();
        tokio::spawn(async move { runtime.drain().await })
    };

    // drain must not finish while the event runs
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!draining.is_finished());
    assert_eq!(runtime.status().await, RuntimeStatus::Draining);

    release.add_permits(1);
    let response = timeout(Duration::from_secs(5), in_flight).await???;
    assert_eq!(response.body_str(), Some("done"));
    timeout(Duration::from_secs(5), draining).await???;
    assert_eq!(runtime.status().await, RuntimeStatus::Drained);

    let logger = runtime.function_logger().clone();
    let err = runtime
        .process_event(Event::new(""), &logger)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidState { .. }));
    assert_eq!(runtime.statistics().snapshot().events_rejected, 1);

    runtime.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_in_process_runtime_has_no_control_channel() -> Result<()> {
    let configuration = Configuration::from_yaml_str(COUNTER_FUNCTION)?;
    let runtime = RuntimeRegistry::with_builtin_kinds(counter_handlers())
        .create(RuntimeBaseParams::new(configuration))
        .await?;

    assert!(!runtime.supports_control_communication());
    let err = runtime
        .control_message_broker()
        .write(ControlMessage::new(ControlMessageKind::DrainRequest))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "runtime rust does not support control communication"
    );

    let err = runtime.restart().await.unwrap_err();
    assert_eq!(err.to_string(), "runtime rust does not support restart");
    assert_eq!(runtime.status().await, RuntimeStatus::Initializing);
    Ok(())
}

#[tokio::test]
async fn test_unknown_binding_kind_fails_construction() -> Result<()> {
    let configuration = Configuration::from_yaml_str(
        r#"
meta:
  name: broken
spec:
  handler: main:count
  runtime: rust
  dataBindings:
    queue:
      kind: kafka
"#,
    )?;

    let err = RuntimeRegistry::with_builtin_kinds(counter_handlers())
        .create(RuntimeBaseParams::new(configuration))
        .await
        .err()
        .expect("construction must fail");

    assert!(err.is_construction_error());
    let chain = processor_runtime::error::error_chain(&err);
    assert_eq!(
        chain.last().map(String::as_str),
        Some("unknown data binding kind 'kafka'")
    );
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_function_sees_scoped_environment() -> Result<()> {
    let configuration = Configuration::builder("env-fn")
        .with_handler("printenv")
        .with_runtime("shell")
        .with_env("GREETING", "hello")
        .with_runtime_attribute("arguments", "GREETING NUCLIO_FUNCTION_NAME".into())
        .build();
    let runtime = RuntimeRegistry::with_builtin_kinds(HandlerRegistry::new())
        .create(RuntimeBaseParams::new(configuration))
        .await?;
    runtime.start().await?;

    let logger = runtime.function_logger().clone();
    let response = runtime.process_event(Event::new(""), &logger).await?;
    assert_eq!(response.body_str(), Some("hello\nenv-fn\n"));

    // the host process is untouched
    assert!(std::env::var("NUCLIO_HANDLER").is_err());
    assert!(std::env::var("GREETING").is_err());

    runtime.stop().await?;
    Ok(())
}
