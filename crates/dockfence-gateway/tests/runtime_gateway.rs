#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use dockfence_core::error::{ClientCode, FenceError};
use dockfence_core::model::CreationRequest;
use dockfence_core::InstanceId;
use dockfence_gateway::config::{RuntimeSection, SecuritySection};
use dockfence_gateway::context::{OwnershipKey, TaggedRequest};
use dockfence_gateway::obs::GatewayMetrics;
use dockfence_gateway::policy::PolicyEngine;
use dockfence_gateway::runtime::{
    InMemoryRuntime, LogOptions, RemoveOptions, RuntimeGateway, StateChange,
};

struct Harness {
    backend: Arc<InMemoryRuntime>,
    gateway: RuntimeGateway,
    metrics: Arc<GatewayMetrics>,
}

fn harness() -> Harness {
    harness_with(RuntimeSection {
        call_timeout_secs: 1,
        ping_timeout_ms: 200,
        ..Default::default()
    })
}

fn harness_with(settings: RuntimeSection) -> Harness {
    let backend = Arc::new(InMemoryRuntime::new());
    let metrics = Arc::new(GatewayMetrics::default());
    let gateway = RuntimeGateway::new(backend.clone(), &settings, Arc::clone(&metrics));
    Harness {
        backend,
        gateway,
        metrics,
    }
}

fn tagged(image: &str) -> TaggedRequest {
    let policy = PolicyEngine::new(&SecuritySection::default()).unwrap();
    let owner = OwnershipKey::new("dockfence", InstanceId::new("alpha").unwrap());
    let sanitized = policy
        .evaluate(CreationRequest::for_image(image))
        .into_result()
        .unwrap();
    owner.tag(sanitized)
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let h = harness();
    let created = h.gateway.create(tagged("nginx")).await.unwrap();
    let grace = Duration::from_secs(0);

    assert_eq!(h.gateway.stop(&created.id, grace).await.unwrap(), StateChange::Unchanged);
    assert_eq!(h.gateway.start(&created.id).await.unwrap(), StateChange::Changed);
    assert_eq!(h.gateway.start(&created.id).await.unwrap(), StateChange::Unchanged);
    assert_eq!(h.gateway.stop(&created.id, grace).await.unwrap(), StateChange::Changed);
    assert_eq!(h.gateway.stop(&created.id, grace).await.unwrap(), StateChange::Unchanged);
    assert_eq!(
        h.metrics
            .runtime_calls
            .get(&[("op", "stop"), ("outcome", "not_modified")]),
        2
    );
}

#[tokio::test]
async fn removing_a_running_container_needs_force() {
    let h = harness();
    let created = h.gateway.create(tagged("nginx")).await.unwrap();
    h.gateway.start(&created.id).await.unwrap();

    let err = h
        .gateway
        .remove(&created.id, RemoveOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.client_code(), ClientCode::Conflict);

    h.gateway
        .remove(
            &created.id,
            RemoveOptions {
                force: true,
                volumes: false,
            },
        )
        .await
        .unwrap();
    let err = h.gateway.inspect(&created.id).await.unwrap_err();
    assert!(matches!(err, FenceError::NotFound(_)));
}

#[tokio::test]
async fn missing_image_is_its_own_error() {
    let h = harness();
    h.backend.mark_missing_image("ghost:latest");
    let err = h.gateway.create(tagged("ghost:latest")).await.unwrap_err();
    assert_eq!(err.client_code(), ClientCode::ImageNotFound);
}

#[tokio::test]
async fn unavailable_daemon_is_retryable_and_not_fatal() {
    let h = harness();
    assert!(h.gateway.ping().await);

    h.backend.set_unavailable(true);
    assert!(!h.gateway.ping().await);
    let err = h.gateway.list(Vec::new(), true).await.unwrap_err();
    assert_eq!(err.client_code(), ClientCode::RuntimeUnavailable);

    h.backend.set_unavailable(false);
    assert!(h.gateway.list(Vec::new(), true).await.unwrap().is_empty());
}

#[tokio::test]
async fn slow_calls_time_out_without_cancelling_the_backend() {
    let h = harness();
    h.backend.set_latency(Duration::from_millis(1500));

    let err = h.gateway.create(tagged("nginx")).await.unwrap_err();
    assert_eq!(err.client_code(), ClientCode::RuntimeUnavailable);
    assert_eq!(
        h.metrics
            .runtime_calls
            .get(&[("op", "create"), ("outcome", "timeout")]),
        1
    );

    // The detached call still completes; its result is simply discarded.
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(h.backend.container_count(), 1);
}

#[tokio::test]
async fn log_snapshot_honours_tail_and_streams() {
    let h = harness();
    let created = h.gateway.create(tagged("nginx")).await.unwrap();
    for i in 1..=5 {
        h.backend.push_log(&created.id, i % 2 == 0, format!("line {i}"));
    }

    let all = h
        .gateway
        .logs_snapshot(&created.id, LogOptions::default())
        .await
        .unwrap();
    assert_eq!(all.lines().count(), 5);

    let opts = LogOptions {
        tail: Some(2),
        ..Default::default()
    };
    let tail = h.gateway.logs_snapshot(&created.id, opts).await.unwrap();
    assert_eq!(tail, "line 4\nline 5\n");

    let opts = LogOptions {
        stderr: false,
        ..Default::default()
    };
    let stdout_only = h.gateway.logs_snapshot(&created.id, opts).await.unwrap();
    assert_eq!(stdout_only, "line 1\nline 3\nline 5\n");
}

#[tokio::test]
async fn log_snapshot_stops_at_the_byte_ceiling() {
    let h = harness_with(RuntimeSection {
        max_log_bytes: 1024,
        ..Default::default()
    });
    let created = h.gateway.create(tagged("nginx")).await.unwrap();
    h.backend.push_log(&created.id, false, "short");
    h.backend.push_log(&created.id, false, "x".repeat(10_000));
    h.backend.push_log(&created.id, false, "never read");

    let text = h
        .gateway
        .logs_snapshot(&created.id, LogOptions::default())
        .await
        .unwrap();
    assert_eq!(text.len(), 1024);
    assert!(text.starts_with("short\nxxx"));
    assert!(!text.contains("never read"));
}
