//! Managed resources and response payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle status as seen through this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Created,
    Running,
    Stopped,
    Removed,
}

impl ResourceStatus {
    /// Collapse a runtime state string (`running`, `exited`, `paused`, ...)
    /// into the four statuses this system exposes.
    pub fn from_runtime_state(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "created" => ResourceStatus::Created,
            "running" | "restarting" | "paused" => ResourceStatus::Running,
            "removing" => ResourceStatus::Removed,
            _ => ResourceStatus::Stopped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// A runtime container created by (and visible to) this instance.
#[derive(Debug, Clone, Serialize)]
pub struct ManagedResource {
    /// Runtime-assigned id (authoritative).
    pub id: String,
    pub short_id: String,
    pub name: String,
    pub image: String,
    pub status: ResourceStatus,
    /// Raw runtime state, e.g. `paused`.
    pub state: String,
    pub created: Option<DateTime<Utc>>,
    pub ports: BTreeMap<String, Vec<HostBinding>>,
    pub labels: BTreeMap<String, String>,
}

/// First 12 characters of a runtime id.
pub fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerList {
    pub containers: Vec<ManagedResource>,
    pub count: usize,
}

impl From<Vec<ManagedResource>> for ContainerList {
    fn from(containers: Vec<ManagedResource>) -> Self {
        let count = containers.len();
        Self { containers, count }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateResponse {
    pub id: String,
    pub name: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub container_id: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>, container_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            container_id: container_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsResponse {
    pub logs: String,
    pub container_id: String,
}

/// Raw counters from one runtime stats read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageSample {
    pub cpu_total: u64,
    pub precpu_total: u64,
    pub system_cpu: u64,
    pub presystem_cpu: u64,
    pub online_cpus: u64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
}

/// Point-in-time usage derived from a `UsageSample`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub container_id: String,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
}

impl StatsSnapshot {
    pub fn from_sample(container_id: impl Into<String>, s: &UsageSample) -> Self {
        let cpu_delta = s.cpu_total.saturating_sub(s.precpu_total) as f64;
        let system_delta = s.system_cpu.saturating_sub(s.presystem_cpu) as f64;
        let cpus = s.online_cpus.max(1) as f64;

        let cpu_percent = if system_delta > 0.0 && cpu_delta > 0.0 {
            cpu_delta / system_delta * cpus * 100.0
        } else {
            0.0
        };
        let memory_percent = if s.memory_limit > 0 {
            s.memory_usage as f64 / s.memory_limit as f64 * 100.0
        } else {
            0.0
        };

        Self {
            container_id: container_id.into(),
            cpu_percent: round2(cpu_percent),
            memory_usage: s.memory_usage,
            memory_limit: s.memory_limit,
            memory_percent: round2(memory_percent),
            network_rx_bytes: s.network_rx_bytes,
            network_tx_bytes: s.network_tx_bytes,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
