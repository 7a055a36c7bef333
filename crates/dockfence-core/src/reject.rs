//! Policy rejection reasons.

use std::fmt;

use serde::Serialize;

/// Why a creation request was refused.
///
/// Serialized adjacently tagged so HTTP bodies read
/// `{"reason": "DisallowedCapability", "detail": "NET_ADMIN"}` and unit
/// reasons carry no `detail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail")]
pub enum RejectReason {
    PrivilegedRequested,
    HostNetworkRequested,
    HostPidRequested,
    HostIpcRequested,
    DeviceAccessRequested,
    SecurityOptRequested,
    SysctlRequested,
    DisallowedCapability(String),
    SensitivePathMount(String),
    ImageNotAllowlisted(String),
}

impl RejectReason {
    /// Stable reason name (the serde tag).
    pub fn name(&self) -> &'static str {
        match self {
            RejectReason::PrivilegedRequested => "PrivilegedRequested",
            RejectReason::HostNetworkRequested => "HostNetworkRequested",
            RejectReason::HostPidRequested => "HostPidRequested",
            RejectReason::HostIpcRequested => "HostIpcRequested",
            RejectReason::DeviceAccessRequested => "DeviceAccessRequested",
            RejectReason::SecurityOptRequested => "SecurityOptRequested",
            RejectReason::SysctlRequested => "SysctlRequested",
            RejectReason::DisallowedCapability(_) => "DisallowedCapability",
            RejectReason::SensitivePathMount(_) => "SensitivePathMount",
            RejectReason::ImageNotAllowlisted(_) => "ImageNotAllowlisted",
        }
    }

    /// Offending value, if the reason carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            RejectReason::DisallowedCapability(v)
            | RejectReason::SensitivePathMount(v)
            | RejectReason::ImageNotAllowlisted(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::PrivilegedRequested => write!(f, "privileged mode is not allowed"),
            RejectReason::HostNetworkRequested => write!(f, "host network mode is not allowed"),
            RejectReason::HostPidRequested => write!(f, "host PID mode is not allowed"),
            RejectReason::HostIpcRequested => write!(f, "host IPC mode is not allowed"),
            RejectReason::DeviceAccessRequested => write!(f, "device mappings are not allowed"),
            RejectReason::SecurityOptRequested => write!(f, "security options are not allowed"),
            RejectReason::SysctlRequested => write!(f, "sysctl settings are not allowed"),
            RejectReason::DisallowedCapability(cap) => {
                write!(f, "capability '{cap}' is not allowed")
            }
            RejectReason::SensitivePathMount(path) => {
                write!(f, "volume mount of '{path}' overlaps a protected host path")
            }
            RejectReason::ImageNotAllowlisted(image) => {
                write!(f, "image '{image}' is not in the allowed images list")
            }
        }
    }
}
