//! Top-level facade crate for dockfence.
//!
//! Re-exports the core model and the gateway library so users can depend on a single crate.

pub mod core {
    pub use dockfence_core::*;
}

pub mod gateway {
    pub use dockfence_gateway::*;
}
