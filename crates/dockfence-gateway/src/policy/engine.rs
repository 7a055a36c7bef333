use std::collections::BTreeSet;

use dockfence_core::error::Result;
use dockfence_core::model::CreationRequest;
use dockfence_core::RejectReason;

use crate::config::schema::SecuritySection;

use super::allowlist::{
    compile_capabilities, compile_image_rules, is_capability_allowed, is_image_allowed, ImageRule,
};
use super::paths::PathDenylist;

/// A request that passed every policy rule.
///
/// Only `evaluate` can construct one, so anything downstream that takes a
/// `SanitizedRequest` is known to have been checked.
#[derive(Debug, Clone)]
pub struct SanitizedRequest(CreationRequest);

impl SanitizedRequest {
    pub fn request(&self) -> &CreationRequest {
        &self.0
    }

    pub fn into_inner(self) -> CreationRequest {
        self.0
    }
}

/// Outcome of policy evaluation.
#[derive(Debug, Clone)]
pub enum ValidationVerdict {
    Accepted(SanitizedRequest),
    Rejected(RejectReason),
}

impl ValidationVerdict {
    pub fn into_result(self) -> std::result::Result<SanitizedRequest, RejectReason> {
        match self {
            ValidationVerdict::Accepted(r) => Ok(r),
            ValidationVerdict::Rejected(reason) => Err(reason),
        }
    }

    pub fn rejection(&self) -> Option<&RejectReason> {
        match self {
            ValidationVerdict::Accepted(_) => None,
            ValidationVerdict::Rejected(reason) => Some(reason),
        }
    }
}

/// Compiled security policy.
/// Construct once at startup, then share via Arc.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    image_rules: Vec<ImageRule>,
    capabilities: BTreeSet<String>,
    denylist: PathDenylist,
}

impl PolicyEngine {
    pub fn new(security: &SecuritySection) -> Result<Self> {
        Ok(Self {
            image_rules: compile_image_rules(&security.allowed_images)?,
            capabilities: compile_capabilities(&security.allowed_capabilities)?,
            denylist: PathDenylist::new(&security.blocked_volume_paths),
        })
    }

    pub fn denylist(&self) -> &PathDenylist {
        &self.denylist
    }

    pub fn evaluate(&self, request: CreationRequest) -> ValidationVerdict {
        evaluate(request, &self.image_rules, &self.capabilities, &self.denylist)
    }
}

// "host" or a join into some other container's namespace.
fn is_shared_namespace(mode: Option<&str>) -> bool {
    match mode {
        Some(m) => {
            let m = m.trim().to_ascii_lowercase();
            m == "host" || m.starts_with("container:")
        }
        None => false,
    }
}

/// Apply the rules in order; the first one that matches rejects.
///
/// Pure: no I/O, no mutation of shared state.
pub fn evaluate(
    request: CreationRequest,
    image_rules: &[ImageRule],
    capabilities: &BTreeSet<String>,
    denylist: &PathDenylist,
) -> ValidationVerdict {
    match first_violation(&request, image_rules, capabilities, denylist) {
        Some(reason) => ValidationVerdict::Rejected(reason),
        None => ValidationVerdict::Accepted(SanitizedRequest(request)),
    }
}

fn first_violation(
    req: &CreationRequest,
    image_rules: &[ImageRule],
    capabilities: &BTreeSet<String>,
    denylist: &PathDenylist,
) -> Option<RejectReason> {
    if req.privileged {
        return Some(RejectReason::PrivilegedRequested);
    }
    if is_shared_namespace(req.network_mode.as_deref()) || is_shared_namespace(req.network.as_deref()) {
        return Some(RejectReason::HostNetworkRequested);
    }
    if is_shared_namespace(req.pid_mode.as_deref()) {
        return Some(RejectReason::HostPidRequested);
    }
    if is_shared_namespace(req.ipc_mode.as_deref()) {
        return Some(RejectReason::HostIpcRequested);
    }
    if !req.devices.is_empty() {
        return Some(RejectReason::DeviceAccessRequested);
    }
    if !req.security_opt.is_empty() {
        return Some(RejectReason::SecurityOptRequested);
    }
    if !req.sysctls.is_empty() {
        return Some(RejectReason::SysctlRequested);
    }
    if let Some(cap) = req.cap_add.iter().find(|c| !is_capability_allowed(capabilities, c)) {
        return Some(RejectReason::DisallowedCapability(cap.clone()));
    }
    if let Some(path) = req.volumes.keys().find(|p| denylist.is_blocked(p)) {
        return Some(RejectReason::SensitivePathMount(path.clone()));
    }
    if !is_image_allowed(image_rules, &req.image) {
        return Some(RejectReason::ImageNotAllowlisted(req.image.clone()));
    }
    None
}
