use std::net::SocketAddr;

use axum::http::HeaderValue;
use serde::Deserialize;
use dockfence_core::error::{FenceError, Result};
use dockfence_core::InstanceId;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub instance: InstanceSection,

    #[serde(default)]
    pub cors: CorsSection,

    #[serde(default)]
    pub security: SecuritySection,

    #[serde(default)]
    pub runtime: RuntimeSection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            instance: InstanceSection::default(),
            cors: CorsSection::default(),
            security: SecuritySection::default(),
            runtime: RuntimeSection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(FenceError::Config(format!(
                "unsupported config version {} (expected 1)",
                self.version
            )));
        }

        self.server.validate()?;
        self.instance.validate()?;
        self.cors.validate()?;
        self.runtime.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl ServerSection {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|_| FenceError::Config(format!("server.listen must be a socket address: {}", self.listen)))
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSection {
    /// Fixed identifier; a random one is generated at startup when absent.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,
}

impl Default for InstanceSection {
    fn default() -> Self {
        Self {
            id: None,
            label_prefix: default_label_prefix(),
        }
    }
}

impl InstanceSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(id) = &self.id {
            InstanceId::new(id.clone())?;
        }
        let p = &self.label_prefix;
        if p.is_empty()
            || !p.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(FenceError::Config(format!(
                "instance.label_prefix must be non-empty [A-Za-z0-9_.-]: {p:?}"
            )));
        }
        Ok(())
    }

    /// Configured id, or 8 hex chars of a fresh v4 uuid.
    /// Call once per process; the result is the instance's identity.
    pub fn resolve_id(&self) -> Result<InstanceId> {
        match &self.id {
            Some(id) => InstanceId::new(id.clone()),
            None => {
                let hex = uuid::Uuid::new_v4().simple().to_string();
                InstanceId::new(hex.chars().take(8).collect::<String>())
            }
        }
    }
}

fn default_label_prefix() -> String {
    "dockfence".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsSection {
    /// `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            allowed_origins: default_cors_origins(),
        }
    }
}

impl CorsSection {
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    pub fn validate(&self) -> Result<()> {
        for origin in &self.allowed_origins {
            if origin != "*" && HeaderValue::from_str(origin).is_err() {
                return Err(FenceError::Config(format!("invalid cors origin: {origin:?}")));
            }
        }
        Ok(())
    }
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecuritySection {
    /// Empty means every image is allowed.
    #[serde(default)]
    pub allowed_images: Vec<String>,

    /// Empty means no capability may be added.
    #[serde(default)]
    pub allowed_capabilities: Vec<String>,

    /// Appended to the built-in denylist.
    #[serde(default)]
    pub blocked_volume_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// `unix:///var/run/docker.sock`, `tcp://host:2375`; local defaults when absent.
    #[serde(default)]
    pub docker_host: Option<String>,

    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,

    #[serde(default = "default_max_log_tail")]
    pub max_log_tail: u64,

    /// Byte ceiling for a non-follow log snapshot.
    #[serde(default = "default_max_log_bytes")]
    pub max_log_bytes: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            docker_host: None,
            call_timeout_secs: default_call_timeout_secs(),
            ping_timeout_ms: default_ping_timeout_ms(),
            stop_grace_secs: default_stop_grace_secs(),
            max_log_tail: default_max_log_tail(),
            max_log_bytes: default_max_log_bytes(),
        }
    }
}

impl RuntimeSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=600).contains(&self.call_timeout_secs) {
            return Err(FenceError::Config(
                "runtime.call_timeout_secs must be between 1 and 600".into(),
            ));
        }
        if !(100..=30000).contains(&self.ping_timeout_ms) {
            return Err(FenceError::Config(
                "runtime.ping_timeout_ms must be between 100 and 30000".into(),
            ));
        }
        if self.stop_grace_secs > 300 {
            return Err(FenceError::Config(
                "runtime.stop_grace_secs must be at most 300".into(),
            ));
        }
        if self.max_log_tail == 0 {
            return Err(FenceError::Config("runtime.max_log_tail must be positive".into()));
        }
        if !(1024..=64 * 1024 * 1024).contains(&self.max_log_bytes) {
            return Err(FenceError::Config(
                "runtime.max_log_bytes must be between 1 KiB and 64 MiB".into(),
            ));
        }
        if let Some(host) = &self.docker_host {
            if !(host.starts_with("unix://") || host.starts_with("tcp://") || host.starts_with("http://")) {
                return Err(FenceError::Config(format!(
                    "runtime.docker_host must be unix://, tcp:// or http://: {host}"
                )));
            }
        }
        Ok(())
    }
}

fn default_call_timeout_secs() -> u64 {
    30
}
fn default_ping_timeout_ms() -> u64 {
    2000
}
fn default_stop_grace_secs() -> u64 {
    10
}
fn default_max_log_tail() -> u64 {
    10_000
}
fn default_max_log_bytes() -> usize {
    4 * 1024 * 1024
}
