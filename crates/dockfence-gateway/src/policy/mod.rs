//! Policy layer (creation-request security rules).
//!
//! Compiles the `security` configuration section into lookup structures once
//! at startup; evaluation afterwards is a pure function over the request.

pub mod allowlist;
pub mod engine;
pub mod paths;

pub use engine::{evaluate, PolicyEngine, SanitizedRequest, ValidationVerdict};
