//! dockfence gateway library entry.
//!
//! Wires config, the policy engine, ownership tagging/filtering, and the
//! runtime gateway into an HTTP stack. Consumed by the binary (`main.rs`) and
//! by integration tests, which swap the Docker backend for the in-memory one.

pub mod app_state;
pub mod config;
pub mod context;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod router;
pub mod runtime;
pub mod transport;
