//! Request and resource model.
//!
//! - `request`: the untrusted creation descriptor and its nested value types.
//! - `resource`: what the gateway hands back (managed containers, logs, stats).
//!
//! Structural checks live next to the types; security policy does not.

pub mod request;
pub mod resource;

pub use request::{
    CommandLine, CreationRequest, MountMode, PortBinding, PortSpec, RestartPolicy,
    RestartPolicyName, VolumeConfig,
};
pub use resource::{
    ContainerList, CreateResponse, HostBinding, LogsResponse, ManagedResource, MessageResponse,
    ResourceStatus, StatsSnapshot, UsageSample,
};
