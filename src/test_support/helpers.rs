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

pub mod test_fixtures {
    use crate::config::{Configuration, ConfigurationBuilder, DataBindingConfig};

    /// Builder for a minimal valid configuration.
    pub fn create_test_configuration(name: &str) -> ConfigurationBuilder {
        Configuration::builder(name)
            .with_handler("main:handler")
            .with_trigger("http", "default-http")
    }

    /// Mock binding config that fails `start()` with the given message.
    pub fn failing_binding(message: &str) -> DataBindingConfig {
        DataBindingConfig::new("mock").with_attribute("failStart", message.into())
    }

    /// Mock binding config whose `start()` takes `millis`.
    pub fn slow_binding(millis: u64) -> DataBindingConfig {
        DataBindingConfig::new("mock").with_attribute("startDelayMillis", millis.into())
    }
}

pub mod test_mocks {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use crate::config::DataBindingConfig;
    use crate::data_bindings::{ContextObject, DataBinding, DataBindingRegistry};

    /// Records what mock bindings did, in order.
    #[derive(Default)]
    pub struct BindingTracker {
        events: Mutex<Vec<String>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl BindingTracker {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        /// Names of bindings whose start succeeded, in completion order.
        pub fn started(&self) -> Vec<String> {
            self.with_prefix("started:")
        }

        /// Names of bindings that were stopped, in stop order.
        pub fn stopped(&self) -> Vec<String> {
            self.with_prefix("stopped:")
        }

        /// Names of bindings whose start was attempted.
        pub fn attempted(&self) -> Vec<String> {
            self.with_prefix("starting:")
        }

        /// Highest number of `start()` calls running at the same time.
        pub fn max_concurrent_starts(&self) -> usize {
            self.max_active.load(Ordering::SeqCst)
        }

        fn with_prefix(&self, prefix: &str) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
                .collect()
        }
    }

    /// Object mock bindings hand to the context.
    #[derive(Debug)]
    pub struct MockConnection {
        pub binding_name: String,
    }

    /// Binding whose behavior is driven by its config attributes:
    /// `failStart`, `failContext`, `failStop` (error messages) and `startDelayMillis`.
    pub struct MockDataBinding {
        name: String,
        kind: String,
        fail_start: Option<String>,
        fail_context: Option<String>,
        fail_stop: Option<String>,
        start_delay: Duration,
        tracker: Arc<BindingTracker>,
    }

    impl MockDataBinding {
        pub fn from_config(config: &DataBindingConfig, tracker: Arc<BindingTracker>) -> Self {
            let text = |key: &str| {
                config
                    .attributes
                    .get(key)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            };
            Self {
                name: config.name.clone(),
                kind: config.kind.clone(),
                fail_start: text("failStart"),
                fail_context: text("failContext"),
                fail_stop: text("failStop"),
                start_delay: Duration::from_millis(
                    config
                        .attributes
                        .get("startDelayMillis")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0),
                ),
                tracker,
            }
        }
    }

    #[async_trait]
    impl DataBinding for MockDataBinding {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> &str {
            &self.kind
        }

        async fn start(&self) -> anyhow::Result<()> {
            self.tracker.record(format!("starting:{}", self.name));
            let active = self.tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.tracker.max_active.fetch_max(active, Ordering::SeqCst);

            if !self.start_delay.is_zero() {
                tokio::time::sleep(self.start_delay).await;
            }
            self.tracker.active.fetch_sub(1, Ordering::SeqCst);

            if let Some(message) = &self.fail_start {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    message.clone(),
                )
                .into());
            }
            self.tracker.record(format!("started:{}", self.name));
            Ok(())
        }

        fn context_object(&self) -> anyhow::Result<ContextObject> {
            if let Some(message) = &self.fail_context {
                return Err(anyhow!("{message}"));
            }
            Ok(Arc::new(MockConnection {
                binding_name: self.name.clone(),
            }))
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.tracker.record(format!("stopped:{}", self.name));
            match &self.fail_stop {
                Some(message) => Err(anyhow!("{message}")),
                None => Ok(()),
            }
        }
    }

    /// Registry with the `mock` kind (reporting to `tracker`) and the built-in kinds.
    pub fn create_mock_registry(tracker: Arc<BindingTracker>) -> DataBindingRegistry {
        let mut registry = DataBindingRegistry::with_builtin_kinds();
        registry.register("mock", move |config| {
            Ok(Arc::new(MockDataBinding::from_config(config, tracker.clone())) as Arc<dyn DataBinding>)
        });
        registry
    }
}
