//! Ownership context: who this process is, and which containers are its own.
//!
//! The instance identity is fixed at startup. Every created container is
//! stamped with it, and every later lookup is filtered by it.

pub mod ownership;

pub use ownership::{authorize, list_owned, OwnershipKey, TaggedRequest};
