//! Gateway config loader (strict parsing + environment overrides).
//!
//! Order: built-in defaults, then the YAML file (if any), then `DOCKFENCE_*`
//! environment variables. The result is validated once and never mutated.

pub mod env;
pub mod schema;

use std::fs;
use std::path::Path;

use dockfence_core::error::{FenceError, Result};

pub use schema::{
    CorsSection, GatewayConfig, InstanceSection, RuntimeSection, SecuritySection, ServerSection,
};

/// Used when `DOCKFENCE_CONFIG` is unset; missing is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "dockfence.yaml";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| FenceError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| FenceError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Process entry point: file (explicit or default path) plus env overrides.
pub fn load() -> Result<GatewayConfig> {
    let mut cfg = match std::env::var(env::CONFIG_PATH_VAR) {
        Ok(path) => load_from_file(&path)?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from_file(DEFAULT_CONFIG_PATH)?,
        Err(_) => GatewayConfig::default(),
    };
    env::apply_overrides(&mut cfg, std::env::vars())?;
    cfg.validate()?;
    Ok(cfg)
}
