//! dockfence core: transport-agnostic request model, verdict reasons, and errors.
//!
//! This crate defines the contracts shared by the gateway, the policy engine,
//! and the runtime backends. It intentionally carries no HTTP or container
//! runtime dependencies so the policy rules can be exercised on plain values.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `FenceError`/`Result` so a hostile
//! request body can never take the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod instance;
pub mod model;
pub mod reject;

/// Shared result type.
pub use error::{Result, FenceError};
pub use instance::InstanceId;
pub use reject::RejectReason;
