//! Container runtime seam.
//!
//! `ContainerRuntime` is the only channel to the daemon. Backends translate
//! their native errors into `RuntimeError`; `RuntimeGateway` adds timeouts,
//! per-call tasks, metrics, and the mapping to `FenceError`.

pub mod docker;
pub mod gateway;
pub mod memory;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use thiserror::Error;

use dockfence_core::model::resource::short_id;
use dockfence_core::model::{CreationRequest, HostBinding, ManagedResource, ResourceStatus, UsageSample};

use crate::context::TaggedRequest;

pub use docker::DockerRuntime;
pub use gateway::{RuntimeGateway, StateChange};
pub use memory::InMemoryRuntime;

/// Errors reported by a runtime backend. Never retried here.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("no such container: {0}")]
    NotFound(String),
    #[error("no such image: {0}")]
    ImageNotFound(String),
    /// Already in the requested state (start on running, stop on stopped).
    #[error("not modified")]
    NotModified,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("daemon unavailable: {0}")]
    Unavailable(String),
    #[error("runtime call timed out")]
    Timeout,
    #[error("{0}")]
    Unexpected(String),
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Log chunks as produced by the runtime.
pub type LogStream = BoxStream<'static, RuntimeResult<Bytes>>;

/// Runtime-neutral view of one container.
#[derive(Debug, Clone, Default)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub created: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
    pub ports: BTreeMap<String, Vec<HostBinding>>,
}

impl ContainerRecord {
    pub fn into_resource(self) -> ManagedResource {
        ManagedResource {
            short_id: short_id(&self.id),
            status: ResourceStatus::from_runtime_state(&self.state),
            id: self.id,
            name: self.name,
            image: self.image,
            state: self.state,
            created: self.created,
            ports: self.ports,
            labels: self.labels,
        }
    }
}

/// Creation input for a backend. Only obtainable from a `TaggedRequest`, so
/// nothing reaches `create` without passing policy and ownership tagging.
#[derive(Debug, Clone)]
pub struct CreateSpec {
    request: CreationRequest,
}

impl CreateSpec {
    pub fn request(&self) -> &CreationRequest {
        &self.request
    }
}

impl From<TaggedRequest> for CreateSpec {
    fn from(tagged: TaggedRequest) -> Self {
        Self {
            request: tagged.into_request(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub id: String,
    pub name: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    pub force: bool,
    /// Also remove anonymous volumes.
    pub volumes: bool,
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    /// Last N lines; `None` = everything.
    pub tail: Option<u64>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub follow: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: true,
            tail: None,
            since: None,
            until: None,
            follow: false,
        }
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> RuntimeResult<()>;
    async fn create(&self, spec: CreateSpec) -> RuntimeResult<CreatedContainer>;
    async fn start(&self, id: &str) -> RuntimeResult<()>;
    async fn stop(&self, id: &str, grace: Duration) -> RuntimeResult<()>;
    async fn restart(&self, id: &str, grace: Duration) -> RuntimeResult<()>;
    async fn remove(&self, id: &str, opts: RemoveOptions) -> RuntimeResult<()>;
    /// Resolve an id (or name / unique id prefix) to its record.
    async fn inspect(&self, id: &str) -> RuntimeResult<ContainerRecord>;
    /// `label_filters` are `key=value` pairs that must all match.
    async fn list(&self, label_filters: &[String], all: bool) -> RuntimeResult<Vec<ContainerRecord>>;
    async fn logs(&self, id: &str, opts: LogOptions) -> RuntimeResult<LogStream>;
    async fn stats(&self, id: &str) -> RuntimeResult<UsageSample>;
}
