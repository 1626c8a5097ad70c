// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack lifecycle tests
//!
//! All tests run on a paused clock, so deadlines and backoffs elapse
//! instantly but are still measured exactly.

mod fixtures;

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_test::{assert_err, assert_ok};

use fixtures::*;
use stack_topology::compiler::compile;
use stack_topology::config::DeployConfig;
use stack_topology::domain::{Context, TopologyRegistry};
use stack_topology::errors::StackError;
use stack_topology::graph::ResourceGraph;
use stack_topology::stack::{CreateOptions, SimulatedBackend, StackManager};
use stack_topology::state_machine::StackStatus;

fn graph() -> ResourceGraph {
    let mut context = Context::init(&scenario_a()).expect("fixture should build");
    compile(&mut context).expect("fixture should compile")
}

fn fast_config() -> DeployConfig {
    DeployConfig {
        poll_interval: Duration::from_millis(500),
        delete_timeout: Duration::from_secs(30),
        delete_retries: 3,
        retry_backoff: Duration::from_secs(1),
    }
}

fn no_params() -> BTreeMap<String, String> {
    BTreeMap::new()
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_blocking_create_collects_outputs() {
    let backend = SimulatedBackend::new()
        .with_create_statuses(["CREATE_IN_PROGRESS", "CREATE_IN_PROGRESS", "CREATE_COMPLETE"])
        .with_output("s1.demo-mgmt-port", "10.0.1.42");
    let manager = StackManager::with_config(backend, fast_config());

    let stack = manager
        .create("demo", &graph(), &no_params(), CreateOptions::blocking(Duration::from_secs(60)))
        .await
        .unwrap();

    assert_eq!(stack.status(), StackStatus::CreateComplete);
    assert!(stack.id.is_some());
    assert_eq!(stack.outputs["s1.demo-mgmt-port"], "10.0.1.42");
    assert_eq!(stack.outputs["demo-mgmt-subnet-cidr"], "10.0.1.0/24");
    assert_eq!(manager.backend().poll_count(), 3);
    assert_eq!(manager.backend().submit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_times_out_at_deadline() {
    let backend = SimulatedBackend::new().with_create_statuses(["CREATE_IN_PROGRESS"]);
    let manager = StackManager::with_config(backend, fast_config());

    let start = Instant::now();
    let err = manager
        .create("demo", &graph(), &no_params(), CreateOptions::blocking(Duration::from_secs(2)))
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(err.is_timeout(), "expected timeout, got {}", err);
    assert!(err.to_string().contains("timeout"));
    assert!(elapsed >= Duration::from_secs(2), "gave up early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "waited too long: {:?}", elapsed);

    let stack = manager.stack("demo").await.unwrap();
    assert_eq!(stack.status(), StackStatus::Creating);
    assert!(stack.id.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_non_blocking_create_returns_immediately() {
    let backend = SimulatedBackend::new().with_create_statuses(["CREATE_IN_PROGRESS"]);
    let manager = StackManager::with_config(backend, fast_config());

    let start = Instant::now();
    let stack = manager
        .create("demo", &graph(), &no_params(), CreateOptions::non_blocking())
        .await
        .unwrap();

    assert!(stack.outputs.is_empty());
    assert_eq!(stack.status(), StackStatus::Creating);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(manager.backend().poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_failure_carries_reason() {
    let backend = SimulatedBackend::new().with_create_failure("Quota exceeded for instances");
    let manager = StackManager::with_config(backend, fast_config());

    let err = manager
        .create("demo", &graph(), &no_params(), CreateOptions::blocking(Duration::from_secs(60)))
        .await
        .unwrap_err();

    match &err {
        StackError::CreateFailed { stack, reason } => {
            assert_eq!(stack, "demo");
            assert_eq!(reason, "Quota exceeded for instances");
        }
        other => panic!("expected CreateFailed, got {:?}", other),
    }
    assert!(!err.is_timeout());
    assert!(!err.to_string().contains("timeout"));

    let stack = manager.stack("demo").await.unwrap();
    assert_eq!(stack.status(), StackStatus::CreateFailed);
    assert_eq!(stack.status_reason.as_deref(), Some("Quota exceeded for instances"));
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_status_keeps_polling() {
    let backend =
        SimulatedBackend::new().with_create_statuses(["SNAPSHOT_IN_PROGRESS", "CREATE_COMPLETE"]);
    let manager = StackManager::with_config(backend, fast_config());

    let stack = manager
        .create("demo", &graph(), &no_params(), CreateOptions::blocking(Duration::from_secs(60)))
        .await
        .unwrap();

    assert_eq!(stack.status(), StackStatus::CreateComplete);
    assert_eq!(manager.backend().poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_stops_wait_and_allows_cleanup() {
    let backend = SimulatedBackend::new().with_create_statuses(["CREATE_IN_PROGRESS"]);
    let manager = StackManager::with_config(backend, fast_config());
    let token = manager.cancellation_token();
    let graph = graph();
    let params = no_params();

    let start = Instant::now();
    let (result, _) = tokio::join!(
        manager.create("demo", &graph, &params, CreateOptions::blocking(Duration::from_secs(600))),
        async {
            sleep(Duration::from_secs(5)).await;
            token.cancel();
        }
    );

    let err = result.unwrap_err();
    assert!(err.is_interrupted(), "expected interrupt, got {}", err);
    assert!(!err.is_timeout());
    assert!(start.elapsed() < Duration::from_secs(6));
    assert_eq!(manager.tracked().await, vec!["demo".to_string()]);

    manager.delete_all().await.unwrap();
    assert!(manager.tracked().await.is_empty());
    assert_eq!(
        manager.stack("demo").await.unwrap().status(),
        StackStatus::DeleteComplete
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_manager_does_not_submit() {
    let manager = StackManager::with_config(SimulatedBackend::new(), fast_config());
    manager.cancel();

    let err = manager
        .create("demo", &graph(), &no_params(), CreateOptions::non_blocking())
        .await
        .unwrap_err();

    assert!(err.is_interrupted(), "expected interrupt, got {}", err);
    assert_eq!(manager.backend().submit_count(), 0);
    let stack = manager.stack("demo").await.unwrap();
    assert_eq!(stack.status(), StackStatus::NotCreated);
    assert!(stack.id.is_none());

    assert_ok!(manager.delete_all().await);
    assert_eq!(manager.backend().delete_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_live_stack_name_cannot_be_reused() {
    let manager = StackManager::with_config(SimulatedBackend::new(), fast_config());
    let graph = graph();
    let options = CreateOptions::blocking(Duration::from_secs(60));

    manager.create("demo", &graph, &no_params(), options).await.unwrap();
    assert!(matches!(
        manager.create("demo", &graph, &no_params(), options).await,
        Err(StackError::AlreadyExists(name)) if name == "demo"
    ));

    manager.delete("demo", true, 1).await.unwrap();
    manager.create("demo", &graph, &no_params(), options).await.unwrap();
    assert_eq!(manager.backend().submit_count(), 2);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_delete_without_backend_id_is_noop() {
    let manager = StackManager::with_config(SimulatedBackend::new(), fast_config());

    assert_ok!(manager.delete("never-created", true, 3).await);

    assert_eq!(manager.backend().delete_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_retries_until_success() {
    let backend = SimulatedBackend::new().fail_deletes(2);
    let manager = StackManager::with_config(backend, fast_config());
    manager
        .create("demo", &graph(), &no_params(), CreateOptions::blocking(Duration::from_secs(60)))
        .await
        .unwrap();

    let start = Instant::now();
    assert_ok!(manager.delete("demo", true, 3).await);

    assert_eq!(manager.backend().delete_count(), 3);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(
        manager.stack("demo").await.unwrap().status(),
        StackStatus::DeleteComplete
    );

    // already gone
    manager.delete("demo", true, 3).await.unwrap();
    assert_eq!(manager.backend().delete_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_delete_gives_up_after_retries() {
    let backend = SimulatedBackend::new().with_delete_statuses(["DELETE_IN_PROGRESS", "DELETE_FAILED"]);
    let manager = StackManager::with_config(backend, fast_config());
    manager
        .create("demo", &graph(), &no_params(), CreateOptions::blocking(Duration::from_secs(60)))
        .await
        .unwrap();

    let err = assert_err!(manager.delete("demo", true, 3).await);

    assert!(matches!(err, StackError::DeleteFailed { .. }));
    assert_eq!(manager.backend().delete_count(), 3);
    let stack = manager.stack("demo").await.unwrap();
    assert_eq!(stack.status(), StackStatus::DeleteFailed);
    assert!(manager.tracked().await.contains(&"demo".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_non_blocking_delete_leaves_stack_deleting() {
    let backend = SimulatedBackend::new().with_delete_statuses(["DELETE_IN_PROGRESS"]);
    let manager = StackManager::with_config(backend, fast_config());
    manager
        .create("demo", &graph(), &no_params(), CreateOptions::blocking(Duration::from_secs(60)))
        .await
        .unwrap();

    manager.delete("demo", false, 1).await.unwrap();

    assert_eq!(
        manager.stack("demo").await.unwrap().status(),
        StackStatus::Deleting
    );
}

#[tokio::test(start_paused = true)]
async fn test_delete_all_removes_every_stack() {
    let manager = StackManager::with_config(SimulatedBackend::new(), fast_config());
    let graph = graph();
    for name in ["one", "two"] {
        manager
            .create(name, &graph, &no_params(), CreateOptions::blocking(Duration::from_secs(60)))
            .await
            .unwrap();
    }
    assert_eq!(manager.tracked().await, vec!["one".to_string(), "two".to_string()]);

    assert_ok!(manager.delete_all().await);

    assert!(manager.tracked().await.is_empty());
    assert_eq!(manager.backend().delete_count(), 2);
}

// ============================================================================
// Context deployment
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_context_deploy_populates_addresses() {
    let backend = SimulatedBackend::new().with_output("gateway.full-fip", "203.0.113.10");
    let manager = StackManager::with_config(backend, fast_config());
    let mut registry = TopologyRegistry::new();
    registry.build_context(&full_context()).unwrap();

    let context = registry.context_mut("full").unwrap();
    context.deploy(&manager).await.unwrap();
    assert_eq!(
        context.stack().unwrap().status(),
        StackStatus::CreateComplete
    );

    let info = registry.server_info("gateway.full").unwrap();
    assert_eq!(info.user, "cloud");
    assert_eq!(info.keypair_name, "full-key");
    assert_eq!(info.public_ip.as_deref(), Some("203.0.113.10"));
    assert!(info.private_ip.unwrap().starts_with("10.0.1."));

    let worker = registry.server_info("worker.full").unwrap();
    assert!(worker.public_ip.is_none());
    assert_eq!(
        worker.interfaces["data"].subnet_cidr.as_deref(),
        Some("10.0.2.0/24")
    );
    assert!(worker.interfaces["data"].mac_address.is_some());

    let context = registry.context_mut("full").unwrap();
    context.undeploy(&manager).await.unwrap();
    assert!(context.stack().is_none());
    assert_eq!(
        manager.stack("full").await.unwrap().status(),
        StackStatus::DeleteComplete
    );
}
