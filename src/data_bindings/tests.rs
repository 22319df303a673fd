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

use super::*;
use crate::config::{Configuration, DataBindingConfig};
use crate::error::{error_chain, RuntimeError};
use crate::test_support::helpers::test_fixtures::{failing_binding, slow_binding};
use crate::test_support::helpers::test_mocks::{create_mock_registry, BindingTracker};

fn named(bindings: Vec<(&str, DataBindingConfig)>) -> HashMap<String, DataBindingConfig> {
    bindings
        .into_iter()
        .map(|(name, config)| (name.to_string(), config.with_name(name)))
        .collect()
}

#[tokio::test]
async fn test_all_bindings_start() {
    let tracker = BindingTracker::new();
    let registry = create_mock_registry(tracker.clone());
    let bindings = named(vec![
        ("a", DataBindingConfig::new("mock")),
        ("b", DataBindingConfig::new("mock")),
        ("c", DataBindingConfig::new("memory")),
    ]);

    let started = start_data_bindings(&registry, &bindings, 4).await.unwrap();

    assert_eq!(
        started.keys().cloned().collect::<Vec<_>>(),
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
    let mut mock_started = tracker.started();
    mock_started.sort();
    assert_eq!(mock_started, vec!["a".to_string(), "b".to_string()]);
    assert!(tracker.stopped().is_empty());
}

#[tokio::test]
async fn test_no_bindings() {
    let registry = DataBindingRegistry::new();
    let started = start_data_bindings(&registry, &HashMap::new(), 4)
        .await
        .unwrap();
    assert!(started.is_empty());
}

#[tokio::test]
async fn test_failure_at_each_position_tears_down_started() {
    let names = ["a", "b", "c", "d"];
    for failing in 0..names.len() {
        let tracker = BindingTracker::new();
        let registry = create_mock_registry(tracker.clone());
        let bindings = named(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let config = if i == failing {
                        failing_binding("connection refused")
                    } else {
                        DataBindingConfig::new("mock")
                    };
                    (*name, config)
                })
                .collect(),
        );

        let err = start_data_bindings(&registry, &bindings, 1)
            .await
            .err()
            .unwrap();

        let expected_started: Vec<String> =
            names[..failing].iter().map(|n| n.to_string()).collect();
        let mut expected_stopped = expected_started.clone();
        expected_stopped.reverse();

        assert_eq!(tracker.started(), expected_started, "failing at {failing}");
        assert_eq!(tracker.stopped(), expected_stopped, "failing at {failing}");
        // nothing after the failing unit was attempted
        assert_eq!(tracker.attempted().len(), failing + 1, "failing at {failing}");
        assert_eq!(
            err.to_string(),
            format!("failed to start data binding '{}'", names[failing])
        );
    }
}

#[tokio::test]
async fn test_lowest_named_failure_is_reported() {
    let tracker = BindingTracker::new();
    let registry = create_mock_registry(tracker.clone());
    let bindings = named(vec![
        ("a-ok", slow_binding(20)),
        (
            "b-fail",
            slow_binding(40).with_attribute("failStart", "slow failure".into()),
        ),
        ("c-fail", failing_binding("fast failure")),
    ]);

    let err = start_data_bindings(&registry, &bindings, 3)
        .await
        .err()
        .unwrap();

    assert_eq!(err.to_string(), "failed to start data binding 'b-fail'");
    assert_eq!(tracker.stopped(), vec!["a-ok".to_string()]);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let tracker = BindingTracker::new();
    let registry = create_mock_registry(tracker.clone());
    let bindings = named(
        ["a", "b", "c", "d", "e", "f"]
            .into_iter()
            .map(|name| (name, slow_binding(20)))
            .collect(),
    );

    let started = start_data_bindings(&registry, &bindings, 2).await.unwrap();

    assert_eq!(started.len(), 6);
    assert!(tracker.max_concurrent_starts() <= 2);
}

#[tokio::test]
async fn test_zero_concurrency_is_clamped() {
    let tracker = BindingTracker::new();
    let registry = create_mock_registry(tracker.clone());
    let bindings = named(vec![("a", DataBindingConfig::new("mock"))]);

    let started = start_data_bindings(&registry, &bindings, 0).await.unwrap();
    assert_eq!(started.len(), 1);
}

#[tokio::test]
async fn test_unknown_kind_chain() {
    let registry = DataBindingRegistry::new();
    let bindings = named(vec![("cache", DataBindingConfig::new("etcd"))]);

    let err = start_data_bindings(&registry, &bindings, 4)
        .await
        .map_err(RuntimeError::ResourceBinding)
        .err()
        .unwrap();

    assert_eq!(
        error_chain(&err),
        vec![
            "failed to create data bindings".to_string(),
            "failed to create data binding 'cache'".to_string(),
            "unknown data binding kind 'etcd'".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_connection_refused_chain() {
    let tracker = BindingTracker::new();
    let registry = create_mock_registry(tracker);
    let bindings = named(vec![("cache", failing_binding("connection refused"))]);

    let err = start_data_bindings(&registry, &bindings, 4)
        .await
        .map_err(RuntimeError::ResourceBinding)
        .err()
        .unwrap();

    assert_eq!(
        error_chain(&err),
        vec![
            "failed to create data bindings".to_string(),
            "failed to start data binding 'cache'".to_string(),
            "connection refused".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_stop_continues_after_failure() {
    let tracker = BindingTracker::new();
    let registry = create_mock_registry(tracker.clone());
    let bindings = named(vec![
        ("a", DataBindingConfig::new("mock")),
        (
            "b",
            DataBindingConfig::new("mock").with_attribute("failStop", "busy".into()),
        ),
        ("c", DataBindingConfig::new("mock")),
    ]);
    let started = start_data_bindings(&registry, &bindings, 4).await.unwrap();

    let err = stop_data_bindings(started).await.unwrap_err();

    assert_eq!(err.to_string(), "failed to stop data binding 'b'");
    assert_eq!(
        tracker.stopped(),
        vec!["c".to_string(), "b".to_string(), "a".to_string()]
    );
}

#[test]
fn test_registry_lookup() {
    let registry = DataBindingRegistry::with_builtin_kinds();
    assert!(registry.has_factory(MEMORY_BINDING_KIND));
    assert!(!registry.has_factory("redis"));
    assert_eq!(registry.registered_types(), vec![MEMORY_BINDING_KIND]);

    let err = registry
        .create(&DataBindingConfig::new("redis"))
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "unknown data binding kind 'redis'");
}

#[tokio::test]
async fn test_legacy_class_matches_kind_for_every_registered_kind() {
    let tracker = BindingTracker::new();
    let registry = create_mock_registry(tracker.clone());

    let mut kinds: Vec<String> = registry
        .registered_types()
        .into_iter()
        .map(str::to_string)
        .collect();
    kinds.sort();

    for kind in kinds {
        let yaml = format!(
            "meta:\n  name: f\nspec:\n  handler: main\n  dataBindings:\n    \
             modern:\n      kind: {kind}\n    legacy:\n      class: {kind}\n"
        );
        let configuration = Configuration::from_yaml_str(&yaml).unwrap();
        let bindings = &configuration.spec.data_bindings;
        assert_eq!(bindings["modern"].kind, bindings["legacy"].kind);

        let started = start_data_bindings(&registry, bindings, 4).await.unwrap();
        assert_eq!(started["modern"].kind(), started["legacy"].kind());
        stop_data_bindings(started).await.unwrap();
    }
}
