//! `DOCKFENCE_*` environment overrides. Lists are comma separated.

use dockfence_core::error::{FenceError, Result};

use super::schema::GatewayConfig;

pub const ENV_PREFIX: &str = "DOCKFENCE_";
pub const CONFIG_PATH_VAR: &str = "DOCKFENCE_CONFIG";

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u64(key: &str, v: &str) -> Result<u64> {
    v.trim()
        .parse()
        .map_err(|_| FenceError::Config(format!("{key} must be an unsigned integer: {v:?}")))
}

/// Apply recognised variables; unknown `DOCKFENCE_*` names are ignored.
pub fn apply_overrides<I>(cfg: &mut GatewayConfig, vars: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else { continue; };
        match name {
            "LISTEN" => cfg.server.listen = value,
            "INSTANCE_ID" => cfg.instance.id = Some(value.trim().to_string()),
            "LABEL_PREFIX" => cfg.instance.label_prefix = value.trim().to_string(),
            "CORS_ORIGINS" => cfg.cors.allowed_origins = split_list(&value),
            "ALLOWED_IMAGES" => cfg.security.allowed_images = split_list(&value),
            "ALLOWED_CAPABILITIES" => cfg.security.allowed_capabilities = split_list(&value),
            "BLOCKED_VOLUME_PATHS" => cfg.security.blocked_volume_paths = split_list(&value),
            "DOCKER_HOST" => cfg.runtime.docker_host = Some(value.trim().to_string()),
            "CALL_TIMEOUT_SECS" => cfg.runtime.call_timeout_secs = parse_u64(&key, &value)?,
            "STOP_GRACE_SECS" => cfg.runtime.stop_grace_secs = parse_u64(&key, &value)?,
            _ => {}
        }
    }
    Ok(())
}
