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

//! Runtime configuration.
//!
//! A [`Configuration`] is loaded from YAML ([`Configuration::from_yaml_str`],
//! [`Configuration::from_file`]) or built with [`Configuration::builder`]. Legacy binding
//! fields are normalized during loading; [`Configuration::validate`] checks the rest
//! and is called again by the runtime before anything is started.

mod schema;


use std::path::Path;

use anyhow::Context as _;

pub use schema::{Configuration, DataBindingConfig, FunctionMeta, FunctionSpec, PlatformConfig};

use crate::error::{Result, RuntimeError};
use crate::logging::FunctionLogger;

impl Configuration {
    /// Start building a configuration for the named function.
    pub fn builder(name: impl Into<String>) -> ConfigurationBuilder {
        ConfigurationBuilder::new(name)
    }

    /// Parse a YAML document. The function logger is named after the function.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut configuration: Configuration = serde_yaml::from_str(yaml)
            .map_err(|e| RuntimeError::configuration(format!("malformed configuration: {e}")))?;
        configuration.function_logger = FunctionLogger::new(&configuration.meta.name);
        Ok(configuration)
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn with_function_logger(mut self, logger: FunctionLogger) -> Self {
        self.function_logger = logger;
        self
    }

    /// Check the fields the runtime relies on.
    pub fn validate(&self) -> Result<()> {
        if self.meta.name.trim().is_empty() {
            return Err(RuntimeError::configuration("function name must not be empty"));
        }
        if self.spec.handler.trim().is_empty() {
            return Err(RuntimeError::configuration(format!(
                "function '{}' has no handler",
                self.meta.name
            )));
        }
        for (binding_name, binding) in &self.spec.data_bindings {
            if binding.kind.trim().is_empty() {
                return Err(RuntimeError::configuration(format!(
                    "data binding '{binding_name}' has no kind"
                )));
            }
            if binding.kind.chars().any(char::is_whitespace) {
                return Err(RuntimeError::configuration(format!(
                    "data binding '{binding_name}' has malformed kind '{}'",
                    binding.kind
                )));
            }
        }
        Ok(())
    }

    pub fn runtime_attribute_str(&self, key: &str) -> Option<&str> {
        self.spec
            .runtime_attributes
            .get(key)
            .and_then(|value| value.as_str())
    }

    pub fn runtime_attribute_u64(&self, key: &str) -> Option<u64> {
        self.spec
            .runtime_attributes
            .get(key)
            .and_then(|value| value.as_u64())
    }

    /// A list attribute given either as a YAML sequence or a whitespace-separated string.
    pub fn runtime_attribute_list(&self, key: &str) -> Vec<String> {
        match self.spec.runtime_attributes.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(s)) => {
                s.split_whitespace().map(str::to_string).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Fluent builder for [`Configuration`].
///
/// ```ignore
/// let configuration = Configuration::builder("echo")
///     .with_namespace("default")
///     .with_handler("echo.sh")
///     .with_runtime("shell")
///     .with_data_binding("cache", DataBindingConfig::new("redis"))
///     .build();
/// ```
pub struct ConfigurationBuilder {
    configuration: Configuration,
}

impl ConfigurationBuilder {
    fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let function_logger = FunctionLogger::new(&name);
        Self {
            configuration: Configuration {
                meta: FunctionMeta {
                    name,
                    namespace: "default".to_string(),
                    labels: Default::default(),
                },
                spec: FunctionSpec::default(),
                worker_id: 0,
                trigger_kind: String::new(),
                trigger_name: String::new(),
                platform: PlatformConfig::default(),
                function_logger,
            },
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.configuration.meta.namespace = namespace.into();
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.configuration.spec.handler = handler.into();
        self
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.configuration.spec.runtime = runtime.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.configuration.spec.description = description.into();
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.configuration.spec.version = version;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configuration.spec.env.insert(key.into(), value.into());
        self
    }

    /// Add a binding. An unnamed binding takes the map key as its name.
    pub fn with_data_binding(
        mut self,
        binding_name: impl Into<String>,
        mut binding: DataBindingConfig,
    ) -> Self {
        let binding_name = binding_name.into();
        if binding.name.is_empty() {
            binding.name = binding_name.clone();
        }
        self.configuration
            .spec
            .data_bindings
            .insert(binding_name, binding);
        self
    }

    pub fn with_runtime_attribute(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.configuration
            .spec
            .runtime_attributes
            .insert(key.into(), value);
        self
    }

    pub fn with_worker_id(mut self, worker_id: usize) -> Self {
        self.configuration.worker_id = worker_id;
        self
    }

    pub fn with_trigger(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.configuration.trigger_kind = kind.into();
        self.configuration.trigger_name = name.into();
        self
    }

    pub fn with_platform_kind(mut self, kind: impl Into<String>) -> Self {
        self.configuration.platform.kind = kind.into();
        self
    }

    pub fn with_function_logger(mut self, logger: FunctionLogger) -> Self {
        self.configuration.function_logger = logger;
        self
    }

    pub fn build(self) -> Configuration {
        self.configuration
    }
}
