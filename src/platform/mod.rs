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

//! Platform handles exposed to function code.
//!
//! A platform describes where the function is deployed and how sibling functions are
//! addressed. The runtime resolves one handle per instance from `platform.kind` and the
//! function namespace.

use std::sync::Arc;

use crate::error::{Result, RuntimeError};

/// Port sibling functions listen on.
pub const DEFAULT_FUNCTION_PORT: u16 = 8080;

pub trait Platform: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> &str;

    fn namespace(&self) -> &str;

    /// Host name under which a sibling function is reachable.
    fn function_host(&self, function_name: &str) -> String;

    fn function_url(&self, function_name: &str) -> String {
        format!(
            "http://{}:{}",
            self.function_host(function_name),
            DEFAULT_FUNCTION_PORT
        )
    }
}

/// Resolves a platform handle for a platform kind and namespace.
pub trait PlatformResolver: Send + Sync {
    fn resolve(&self, kind: &str, namespace: &str) -> Result<Arc<dyn Platform>>;
}

/// Functions running side by side on one host, addressed by name.
#[derive(Debug, Clone)]
pub struct LocalPlatform {
    namespace: String,
}

impl LocalPlatform {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Platform for LocalPlatform {
    fn kind(&self) -> &str {
        "local"
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn function_host(&self, function_name: &str) -> String {
        function_name.to_string()
    }
}

/// Functions deployed as cluster services.
#[derive(Debug, Clone)]
pub struct KubePlatform {
    namespace: String,
}

impl KubePlatform {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Platform for KubePlatform {
    fn kind(&self) -> &str {
        "kube"
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn function_host(&self, function_name: &str) -> String {
        format!("{}.{}.svc.cluster.local", function_name, self.namespace)
    }
}

/// Resolver for the `local` and `kube` platform kinds.
#[derive(Debug, Clone, Default)]
pub struct DefaultPlatformResolver;

impl PlatformResolver for DefaultPlatformResolver {
    fn resolve(&self, kind: &str, namespace: &str) -> Result<Arc<dyn Platform>> {
        match kind {
            "local" => Ok(Arc::new(LocalPlatform::new(namespace))),
            "kube" => {
                if namespace.is_empty() {
                    return Err(RuntimeError::platform_resolution(
                        kind,
                        namespace,
                        "kube platform requires a namespace",
                    ));
                }
                Ok(Arc::new(KubePlatform::new(namespace)))
            }
            other => Err(RuntimeError::platform_resolution(
                other,
                namespace,
                "unknown platform kind",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_local() {
        let platform = DefaultPlatformResolver.resolve("local", "default").unwrap();
        assert_eq!(platform.kind(), "local");
        assert_eq!(platform.function_url("echo"), "http://echo:8080");
    }

    #[test]
    fn test_resolve_kube() {
        let platform = DefaultPlatformResolver.resolve("kube", "staging").unwrap();
        assert_eq!(platform.namespace(), "staging");
        assert_eq!(
            platform.function_host("echo"),
            "echo.staging.svc.cluster.local"
        );
    }

    #[test]
    fn test_unknown_kind_fails() {
        let err = DefaultPlatformResolver.resolve("swarm", "default").unwrap_err();
        match err {
            RuntimeError::PlatformResolution { kind, reason, .. } => {
                assert_eq!(kind, "swarm");
                assert_eq!(reason, "unknown platform kind");
            }
            other => panic!("Expected PlatformResolution, got {other:?}"),
        }
    }

    #[test]
    fn test_kube_requires_namespace() {
        assert!(DefaultPlatformResolver.resolve("kube", "").is_err());
    }
}
