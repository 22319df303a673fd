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

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::logging::FunctionLogger;

/// Function identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FunctionMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// What the function runs and which resources it binds.
///
/// # Example
///
/// ```yaml
/// spec:
///   handler: main:handler
///   runtime: python:3.11
///   version: 3
///   env:
///     LOG_LEVEL: debug
///   dataBindings:
///     cache:
///       kind: redis
///       url: redis://localhost:6379
///   runtimeAttributes:
///     command: /opt/wrapper/run
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    #[serde(default)]
    pub handler: String,
    #[serde(default)]
    pub runtime: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, deserialize_with = "deserialize_data_bindings")]
    pub data_bindings: HashMap<String, DataBindingConfig>,
    #[serde(default)]
    pub runtime_attributes: HashMap<String, serde_json::Value>,
}

/// Configuration of one data binding.
///
/// Older function specs put the binding kind in `class`. Deserialization folds that
/// field into `kind` once; code past the loader only ever sees `kind`. When both are
/// present, `kind` wins.
///
/// ```yaml
/// dataBindings:
///   cache:
///     kind: redis
///   legacy:
///     class: redis      # same binding kind as above
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(from = "RawDataBindingConfig", rename_all = "camelCase")]
pub struct DataBindingConfig {
    pub kind: String,
    pub name: String,
    pub url: String,
    pub path: String,
    pub secret: String,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl DataBindingConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// On-disk shape of a binding, including the legacy `class` field.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDataBindingConfig {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    secret: String,
    #[serde(default)]
    attributes: HashMap<String, serde_json::Value>,
}

impl From<RawDataBindingConfig> for DataBindingConfig {
    fn from(raw: RawDataBindingConfig) -> Self {
        let kind = if raw.kind.is_empty() {
            raw.class
        } else {
            raw.kind
        };
        Self {
            kind,
            name: raw.name,
            url: raw.url,
            path: raw.path,
            secret: raw.secret,
            attributes: raw.attributes,
        }
    }
}

/// Bindings without an explicit name are named after their map key.
fn deserialize_data_bindings<'de, D>(
    deserializer: D,
) -> Result<HashMap<String, DataBindingConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut bindings = HashMap::<String, DataBindingConfig>::deserialize(deserializer)?;
    for (key, binding) in bindings.iter_mut() {
        if binding.name.is_empty() {
            binding.name = key.clone();
        }
    }
    Ok(bindings)
}

/// Deployment platform descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    #[serde(default = "default_platform_kind")]
    pub kind: String,
}

fn default_platform_kind() -> String {
    "local".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            kind: default_platform_kind(),
        }
    }
}

/// Everything a runtime instance needs, supplied once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub meta: FunctionMeta,
    pub spec: FunctionSpec,
    #[serde(default)]
    pub worker_id: usize,
    #[serde(default)]
    pub trigger_kind: String,
    #[serde(default)]
    pub trigger_name: String,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(skip)]
    pub function_logger: FunctionLogger,
}
