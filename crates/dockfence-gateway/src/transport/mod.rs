//! HTTP transport.
//!
//! Handlers decode the request once, hand it to policy/ownership/runtime in
//! that order, and turn every `FenceError` into a JSON error body.

pub mod http;
pub mod response;

pub use response::ApiError;
