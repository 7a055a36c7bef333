//! Container creation request (untrusted input).
//!
//! Every optional field defaults to the safe value: no privilege, no host
//! namespaces, no devices, no added capabilities. `null` is accepted wherever a
//! field is optional and means "absent".

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::error::{FenceError, Result};

/// Default host interface for published ports.
pub const DEFAULT_HOST_IP: &str = "0.0.0.0";

fn null_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

fn default_host_ip() -> String {
    DEFAULT_HOST_IP.into()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreationRequest {
    pub image: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub command: Option<CommandLine>,
    #[serde(default)]
    pub entrypoint: Option<CommandLine>,
    #[serde(default, deserialize_with = "null_default")]
    pub environment: BTreeMap<String, String>,
    /// `"80/tcp"` -> host binding(s).
    #[serde(default, deserialize_with = "null_default")]
    pub ports: BTreeMap<String, PortSpec>,
    /// Host path -> container binding.
    #[serde(default, deserialize_with = "null_default")]
    pub volumes: BTreeMap<String, VolumeConfig>,
    #[serde(default, deserialize_with = "null_default")]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub restart_policy: Option<RestartPolicy>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    /// e.g. `512m`, `1g`.
    #[serde(default)]
    pub mem_limit: Option<String>,
    #[serde(default)]
    pub cpu_period: Option<i64>,
    #[serde(default)]
    pub cpu_quota: Option<i64>,

    // privilege-bearing fields
    #[serde(default, deserialize_with = "null_default")]
    pub privileged: bool,
    #[serde(default)]
    pub network_mode: Option<String>,
    #[serde(default)]
    pub pid_mode: Option<String>,
    #[serde(default)]
    pub ipc_mode: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub cap_add: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub devices: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub security_opt: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub sysctls: BTreeMap<String, String>,
}

impl CreationRequest {
    /// Minimal request for `image`, everything else at its safe default.
    pub fn for_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// Structural validation (shape and syntax, not security policy).
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(FenceError::BadRequest("image must not be empty".into()));
        }
        if self.image.chars().any(char::is_whitespace) {
            return Err(FenceError::BadRequest(format!(
                "image must not contain whitespace: {}",
                self.image
            )));
        }
        if let Some(name) = &self.name {
            validate_container_name(name)?;
        }
        for (key, spec) in &self.ports {
            normalize_port_key(key)?;
            for b in spec.bindings() {
                if b.host_port == 0 {
                    return Err(FenceError::BadRequest(format!(
                        "host_port for {key} must be between 1 and 65535"
                    )));
                }
            }
        }
        for (host, vol) in &self.volumes {
            if host.trim().is_empty() {
                return Err(FenceError::BadRequest("volume host path must not be empty".into()));
            }
            if host.contains('\0') || vol.bind.contains('\0') {
                return Err(FenceError::BadRequest("volume paths must not contain NUL".into()));
            }
            // joined as host:bind:mode
            if host.contains(':') || vol.bind.contains(':') {
                return Err(FenceError::BadRequest(format!(
                    "volume paths must not contain ':': {host} -> {}",
                    vol.bind
                )));
            }
            if !vol.bind.starts_with('/') {
                return Err(FenceError::BadRequest(format!(
                    "volume bind must be an absolute container path: {}",
                    vol.bind
                )));
            }
        }
        if let Some(limit) = &self.mem_limit {
            parse_memory_limit(limit)?;
        }
        if let Some(rp) = &self.restart_policy {
            if rp.maximum_retry_count < 0 {
                return Err(FenceError::BadRequest(
                    "restart_policy.maximum_retry_count must not be negative".into(),
                ));
            }
        }
        Ok(())
    }

    /// Memory limit in bytes, if one was requested.
    pub fn memory_bytes(&self) -> Result<Option<i64>> {
        self.mem_limit.as_deref().map(parse_memory_limit).transpose()
    }
}

/// Either a shell-style string or an explicit argv list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Shell(String),
    Exec(Vec<String>),
}

impl CommandLine {
    /// Argument vector handed to the runtime.
    pub fn to_args(&self) -> Result<Vec<String>> {
        match self {
            CommandLine::Exec(args) => Ok(args.clone()),
            CommandLine::Shell(s) => split_shell_words(s),
        }
    }
}

/// Port publication: bare host port, one binding, or several.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    HostPort(u16),
    Binding(PortBinding),
    Bindings(Vec<PortBinding>),
}

impl PortSpec {
    pub fn bindings(&self) -> Vec<PortBinding> {
        match self {
            PortSpec::HostPort(port) => vec![PortBinding {
                host_ip: default_host_ip(),
                host_port: *port,
            }],
            PortSpec::Binding(b) => vec![b.clone()],
            PortSpec::Bindings(bs) => bs.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortBinding {
    #[serde(default = "default_host_ip")]
    pub host_ip: String,
    pub host_port: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeConfig {
    /// Container path to mount to.
    pub bind: String,
    #[serde(default)]
    pub mode: MountMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    Ro,
    #[default]
    Rw,
}

impl MountMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MountMode::Ro => "ro",
            MountMode::Rw => "rw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestartPolicy {
    #[serde(default)]
    pub name: RestartPolicyName,
    #[serde(default)]
    pub maximum_retry_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RestartPolicyName {
    #[default]
    #[serde(rename = "no")]
    No,
    #[serde(rename = "always")]
    Always,
    #[serde(rename = "on-failure")]
    OnFailure,
    #[serde(rename = "unless-stopped")]
    UnlessStopped,
}

/// Normalize `"80"` / `"80/TCP"` to `"80/tcp"`.
pub fn normalize_port_key(key: &str) -> Result<String> {
    let (port, proto) = match key.split_once('/') {
        Some((p, proto)) => (p, proto.to_ascii_lowercase()),
        None => (key, "tcp".to_string()),
    };
    let port: u16 = port
        .parse()
        .map_err(|_| FenceError::BadRequest(format!("invalid container port: {key}")))?;
    if port == 0 {
        return Err(FenceError::BadRequest(format!("invalid container port: {key}")));
    }
    if !matches!(proto.as_str(), "tcp" | "udp" | "sctp") {
        return Err(FenceError::BadRequest(format!("invalid port protocol: {key}")));
    }
    Ok(format!("{port}/{proto}"))
}

/// Parse `512m`, `1g`, `1024k`, `100b`, or a bare byte count.
pub fn parse_memory_limit(raw: &str) -> Result<i64> {
    let s = raw.trim().to_ascii_lowercase();
    let bad = || FenceError::BadRequest(format!("invalid mem_limit: {raw}"));

    let (digits, mult): (&str, i64) = match s.chars().last() {
        Some('b') => (&s[..s.len() - 1], 1),
        Some('k') => (&s[..s.len() - 1], 1 << 10),
        Some('m') => (&s[..s.len() - 1], 1 << 20),
        Some('g') => (&s[..s.len() - 1], 1 << 30),
        Some(c) if c.is_ascii_digit() => (s.as_str(), 1),
        _ => return Err(bad()),
    };
    let n: i64 = digits.parse().map_err(|_| bad())?;
    if n <= 0 {
        return Err(bad());
    }
    n.checked_mul(mult).ok_or_else(bad)
}

// Docker's own rule: [a-zA-Z0-9][a-zA-Z0-9_.-]*
fn validate_container_name(name: &str) -> Result<()> {
    let name = name.strip_prefix('/').unwrap_or(name);
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(first) => {
            first.is_ascii_alphanumeric()
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        None => false,
    };
    if ok {
        Ok(())
    } else {
        Err(FenceError::BadRequest(format!("invalid container name: {name}")))
    }
}

/// POSIX-style word splitting: whitespace separated, single quotes literal,
/// double quotes with backslash escapes for `"` and `\`.
pub fn split_shell_words(s: &str) -> Result<Vec<String>> {
    #[derive(PartialEq)]
    enum Mode {
        Plain,
        Single,
        Double,
    }

    let mut words = Vec::new();
    let mut cur = String::new();
    let mut in_word = false;
    let mut mode = Mode::Plain;
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match mode {
            Mode::Plain => match c {
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut cur));
                        in_word = false;
                    }
                }
                '\'' => {
                    mode = Mode::Single;
                    in_word = true;
                }
                '"' => {
                    mode = Mode::Double;
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        cur.push(next);
                    }
                    in_word = true;
                }
                c => {
                    cur.push(c);
                    in_word = true;
                }
            },
            Mode::Single => match c {
                '\'' => mode = Mode::Plain,
                c => cur.push(c),
            },
            Mode::Double => match c {
                '"' => mode = Mode::Plain,
                '\\' => match chars.next() {
                    Some(n @ ('"' | '\\')) => cur.push(n),
                    Some(n) => {
                        cur.push('\\');
                        cur.push(n);
                    }
                    None => cur.push('\\'),
                },
                c => cur.push(c),
            },
        }
    }

    if mode != Mode::Plain {
        return Err(FenceError::BadRequest(format!("unterminated quote in command: {s}")));
    }
    if in_word {
        words.push(cur);
    }
    Ok(words)
}
