//! Per-process instance identity.

use std::fmt;

use serde::Serialize;

use crate::error::{FenceError, Result};

/// Maximum accepted length of an instance identifier.
pub const MAX_INSTANCE_ID_LEN: usize = 64;

/// Partition key isolating one deployment from another on a shared daemon.
///
/// Fixed at startup and never mutated; cloned into whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Validate and wrap an identifier (`[A-Za-z0-9_.-]`, 1..=64 chars).
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_INSTANCE_ID_LEN {
            return Err(FenceError::Config(format!(
                "instance id must be 1..={MAX_INSTANCE_ID_LEN} characters"
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(FenceError::Config(format!(
                "instance id contains invalid characters: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
