//! Shared application state.
//!
//! Built once at startup from the validated config; everything inside is
//! read-only afterwards, so handlers share it without locks.

use std::sync::Arc;

use dockfence_core::error::Result;

use crate::config::GatewayConfig;
use crate::context::OwnershipKey;
use crate::obs::GatewayMetrics;
use crate::policy::PolicyEngine;
use crate::runtime::{ContainerRuntime, RuntimeGateway};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    owner: OwnershipKey,
    policy: PolicyEngine,
    runtime: RuntimeGateway,
    metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Compile policy, fix the instance identity, and wrap the backend.
    /// Returns Result so main can report bad config without panicking.
    pub fn new(cfg: GatewayConfig, backend: Arc<dyn ContainerRuntime>) -> Result<Self> {
        let instance = cfg.instance.resolve_id()?;
        let owner = OwnershipKey::new(&cfg.instance.label_prefix, instance);
        let policy = PolicyEngine::new(&cfg.security)?;
        let metrics = Arc::new(GatewayMetrics::default());
        let runtime = RuntimeGateway::new(backend, &cfg.runtime, Arc::clone(&metrics));

        tracing::info!(
            instance = %owner.instance(),
            managed_label = owner.managed_label(),
            blocked_paths = policy.denylist().entries().len(),
            "ownership and policy initialized"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                owner,
                policy,
                runtime,
                metrics,
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn owner(&self) -> &OwnershipKey {
        &self.inner.owner
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.inner.policy
    }

    pub fn runtime(&self) -> &RuntimeGateway {
        &self.inner.runtime
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.inner.metrics
    }
}
