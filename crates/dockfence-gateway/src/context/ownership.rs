//! Ownership tagging (write path) and filtering (read/list paths).

use std::collections::BTreeMap;

use dockfence_core::error::{FenceError, Result};
use dockfence_core::model::{CreationRequest, ManagedResource};
use dockfence_core::InstanceId;

use crate::obs::GatewayMetrics;
use crate::policy::SanitizedRequest;
use crate::runtime::{ContainerRecord, RuntimeGateway};

const MANAGED_VALUE: &str = "true";

/// Label keys and values that mark a container as owned by this instance.
#[derive(Debug, Clone)]
pub struct OwnershipKey {
    prefix: String,
    managed_label: String,
    instance_label: String,
    instance: InstanceId,
}

/// A sanitized request carrying this instance's ownership labels.
///
/// Only `OwnershipKey::tag` builds one; the runtime create path only accepts
/// this type.
#[derive(Debug, Clone)]
pub struct TaggedRequest(CreationRequest);

impl TaggedRequest {
    pub fn request(&self) -> &CreationRequest {
        &self.0
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.0.labels
    }

    pub(crate) fn into_request(self) -> CreationRequest {
        self.0
    }
}

impl OwnershipKey {
    pub fn new(label_prefix: &str, instance: InstanceId) -> Self {
        Self {
            prefix: format!("{label_prefix}."),
            managed_label: format!("{label_prefix}.managed"),
            instance_label: format!("{label_prefix}.instance"),
            instance,
        }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn managed_label(&self) -> &str {
        &self.managed_label
    }

    pub fn instance_label(&self) -> &str {
        &self.instance_label
    }

    /// Stamp the ownership labels. Caller labels inside the reserved
    /// namespace are dropped first, so they can't be merged or spoofed.
    pub fn tag(&self, sanitized: SanitizedRequest) -> TaggedRequest {
        let mut req = sanitized.into_inner();
        let dropped: Vec<String> = req
            .labels
            .keys()
            .filter(|k| k.starts_with(&self.prefix))
            .cloned()
            .collect();
        for key in dropped {
            tracing::debug!(label = %key, "dropping caller label in reserved namespace");
            req.labels.remove(&key);
        }
        req.labels
            .insert(self.managed_label.clone(), MANAGED_VALUE.to_string());
        req.labels
            .insert(self.instance_label.clone(), self.instance.as_str().to_string());
        TaggedRequest(req)
    }

    /// Both labels present with exact values.
    pub fn owns(&self, labels: &BTreeMap<String, String>) -> bool {
        labels.get(&self.managed_label).map(String::as_str) == Some(MANAGED_VALUE)
            && labels.get(&self.instance_label).map(String::as_str) == Some(self.instance.as_str())
    }

    /// `key=value` filters for the runtime-side listing.
    pub fn label_filters(&self) -> Vec<String> {
        vec![
            format!("{}={MANAGED_VALUE}", self.managed_label),
            format!("{}={}", self.instance_label, self.instance),
        ]
    }
}

/// Resolve `id` and return it only if this instance owns it.
///
/// Unknown and foreign containers are indistinguishable: both are `NotFound`
/// carrying the caller's own reference.
pub async fn authorize(
    runtime: &RuntimeGateway,
    owner: &OwnershipKey,
    metrics: &GatewayMetrics,
    id: &str,
) -> Result<ManagedResource> {
    // Only an unreachable runtime is reported as such; any other inspect
    // failure (ambiguous prefix, malformed reference) reads as missing.
    let record = match runtime.inspect(id).await {
        Ok(r) => r,
        Err(e @ FenceError::RuntimeUnavailable(_)) => return Err(e),
        Err(e) => {
            tracing::debug!(container_ref = %id, error = %e, "inspect failed; reporting not found");
            return Err(FenceError::NotFound(id.to_string()));
        }
    };
    if !owner.owns(&record.labels) {
        metrics.ownership_denials.inc(&[("op", "lookup")]);
        tracing::debug!(container_ref = %id, "container not owned by this instance");
        return Err(FenceError::NotFound(id.to_string()));
    }
    Ok(record.into_resource())
}

/// Owned containers only. The runtime filter narrows the listing; each
/// record is checked again here before it is returned.
pub async fn list_owned(
    runtime: &RuntimeGateway,
    owner: &OwnershipKey,
    metrics: &GatewayMetrics,
    all: bool,
) -> Result<Vec<ManagedResource>> {
    let records = runtime.list(owner.label_filters(), all).await?;
    let total = records.len();
    let owned: Vec<ManagedResource> = records
        .into_iter()
        .filter(|r: &ContainerRecord| owner.owns(&r.labels))
        .map(ContainerRecord::into_resource)
        .collect();
    if owned.len() < total {
        metrics.ownership_denials.inc(&[("op", "list")]);
        tracing::warn!(
            dropped = total - owned.len(),
            "runtime label filter returned foreign containers"
        );
    }
    Ok(owned)
}
