//! Runtime Gateway: bounded, isolated runtime calls.
//!
//! Each call runs on its own task under a timeout. When the inbound request is
//! dropped or the timeout fires, the task keeps running and its result is
//! discarded; daemons don't support cancelling in-flight operations. Nothing
//! is retried here.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::TryStreamExt;

use dockfence_core::error::{FenceError, Result};
use dockfence_core::model::UsageSample;

use crate::config::RuntimeSection;
use crate::context::TaggedRequest;
use crate::obs::GatewayMetrics;

use super::{
    ContainerRecord, ContainerRuntime, CreateSpec, CreatedContainer, LogOptions, LogStream,
    RemoveOptions, RuntimeError, RuntimeResult,
};

/// Whether a lifecycle call changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Changed,
    /// Already in the requested state.
    Unchanged,
}

#[derive(Clone)]
pub struct RuntimeGateway {
    runtime: Arc<dyn ContainerRuntime>,
    call_timeout: Duration,
    ping_timeout: Duration,
    max_log_bytes: usize,
    metrics: Arc<GatewayMetrics>,
}

fn outcome<T>(res: &RuntimeResult<T>) -> &'static str {
    match res {
        Ok(_) => "ok",
        Err(RuntimeError::NotFound(_)) | Err(RuntimeError::ImageNotFound(_)) => "not_found",
        Err(RuntimeError::NotModified) => "not_modified",
        Err(RuntimeError::Conflict(_)) => "conflict",
        Err(RuntimeError::Unavailable(_)) => "unavailable",
        Err(RuntimeError::Timeout) => "timeout",
        Err(RuntimeError::Unexpected(_)) => "error",
    }
}

/// Map a backend error to the client-facing taxonomy, logging full context.
fn into_fence(op: &'static str, id: &str, err: RuntimeError) -> FenceError {
    match err {
        RuntimeError::NotFound(_) => FenceError::NotFound(id.to_string()),
        RuntimeError::ImageNotFound(image) => FenceError::ImageNotFound(image),
        RuntimeError::Conflict(detail) => {
            tracing::info!(op, container_id = %id, %detail, "runtime reported state conflict");
            FenceError::Conflict(detail)
        }
        RuntimeError::Unavailable(detail) => {
            tracing::warn!(op, container_id = %id, %detail, "container runtime unavailable");
            FenceError::RuntimeUnavailable(detail)
        }
        RuntimeError::Timeout => {
            tracing::warn!(op, container_id = %id, "runtime call timed out");
            FenceError::RuntimeUnavailable(format!("{op} timed out"))
        }
        RuntimeError::NotModified => {
            tracing::error!(op, container_id = %id, "unexpected not-modified answer");
            FenceError::Unexpected(format!("{op}: unexpected not-modified answer"))
        }
        RuntimeError::Unexpected(detail) => {
            tracing::error!(op, container_id = %id, %detail, "unexpected runtime error");
            FenceError::Unexpected(detail)
        }
    }
}

impl RuntimeGateway {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        settings: &RuntimeSection,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            runtime,
            call_timeout: Duration::from_secs(settings.call_timeout_secs),
            ping_timeout: Duration::from_millis(settings.ping_timeout_ms),
            max_log_bytes: settings.max_log_bytes,
            metrics,
        }
    }

    async fn call<T, F, Fut>(&self, op: &'static str, budget: Duration, f: F) -> RuntimeResult<T>
    where
        F: FnOnce(Arc<dyn ContainerRuntime>) -> Fut,
        Fut: Future<Output = RuntimeResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let task = tokio::spawn(f(Arc::clone(&self.runtime)));

        let res = match tokio::time::timeout(budget, task).await {
            Ok(Ok(r)) => r,
            Ok(Err(join)) => Err(RuntimeError::Unexpected(format!("runtime task failed: {join}"))),
            Err(_) => Err(RuntimeError::Timeout),
        };

        self.metrics.record_runtime_call(op, outcome(&res), started.elapsed());
        res
    }

    /// Cheap liveness probe bounded by `ping_timeout_ms`.
    pub async fn ping(&self) -> bool {
        self.call("ping", self.ping_timeout, |rt| async move { rt.ping().await })
            .await
            .is_ok()
    }

    pub async fn create(&self, tagged: TaggedRequest) -> Result<CreatedContainer> {
        let spec = CreateSpec::from(tagged);
        let image = spec.request().image.clone();
        self.call("create", self.call_timeout, move |rt| async move { rt.create(spec).await })
            .await
            .map_err(|e| into_fence("create", &image, e))
    }

    pub async fn start(&self, id: &str) -> Result<StateChange> {
        let owned = id.to_string();
        match self
            .call("start", self.call_timeout, move |rt| async move { rt.start(&owned).await })
            .await
        {
            Ok(()) => Ok(StateChange::Changed),
            Err(RuntimeError::NotModified) => Ok(StateChange::Unchanged),
            Err(e) => Err(into_fence("start", id, e)),
        }
    }

    /// `grace` is how long the runtime waits before killing; it extends the
    /// call's time budget.
    pub async fn stop(&self, id: &str, grace: Duration) -> Result<StateChange> {
        let owned = id.to_string();
        match self
            .call("stop", self.call_timeout + grace, move |rt| async move {
                rt.stop(&owned, grace).await
            })
            .await
        {
            Ok(()) => Ok(StateChange::Changed),
            Err(RuntimeError::NotModified) => Ok(StateChange::Unchanged),
            Err(e) => Err(into_fence("stop", id, e)),
        }
    }

    pub async fn restart(&self, id: &str, grace: Duration) -> Result<()> {
        let owned = id.to_string();
        self.call("restart", self.call_timeout + grace, move |rt| async move {
            rt.restart(&owned, grace).await
        })
        .await
        .map_err(|e| into_fence("restart", id, e))
    }

    pub async fn remove(&self, id: &str, opts: RemoveOptions) -> Result<()> {
        let owned = id.to_string();
        self.call("remove", self.call_timeout, move |rt| async move {
            rt.remove(&owned, opts).await
        })
        .await
        .map_err(|e| into_fence("remove", id, e))
    }

    pub async fn inspect(&self, id: &str) -> Result<ContainerRecord> {
        let owned = id.to_string();
        self.call("inspect", self.call_timeout, move |rt| async move { rt.inspect(&owned).await })
            .await
            .map_err(|e| into_fence("inspect", id, e))
    }

    pub async fn list(&self, label_filters: Vec<String>, all: bool) -> Result<Vec<ContainerRecord>> {
        self.call("list", self.call_timeout, move |rt| async move {
            rt.list(&label_filters, all).await
        })
        .await
        .map_err(|e| into_fence("list", "-", e))
    }

    /// Open a log stream (used for `follow`). Only opening is time-bounded.
    pub async fn logs_stream(&self, id: &str, opts: LogOptions) -> Result<LogStream> {
        let owned = id.to_string();
        self.call("logs", self.call_timeout, move |rt| async move { rt.logs(&owned, opts).await })
            .await
            .map_err(|e| into_fence("logs", id, e))
    }

    /// Collect a bounded log snapshot into text (lossy UTF-8).
    ///
    /// Output stops at `max_log_bytes`; the stream is dropped once the ceiling
    /// is hit, cutting the last chunk short.
    pub async fn logs_snapshot(&self, id: &str, opts: LogOptions) -> Result<String> {
        let owned = id.to_string();
        let ceiling = self.max_log_bytes;
        let bytes = self
            .call("logs", self.call_timeout, move |rt| async move {
                let mut stream = rt.logs(&owned, opts).await?;
                let mut acc = Vec::new();
                while let Some(chunk) = stream.try_next().await? {
                    let room = ceiling.saturating_sub(acc.len());
                    if chunk.len() >= room {
                        acc.extend_from_slice(&chunk[..room]);
                        tracing::debug!(container_id = %owned, ceiling, "log snapshot truncated");
                        break;
                    }
                    acc.extend_from_slice(&chunk);
                }
                Ok(acc)
            })
            .await
            .map_err(|e| into_fence("logs", id, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn stats(&self, id: &str) -> Result<UsageSample> {
        let owned = id.to_string();
        self.call("stats", self.call_timeout, move |rt| async move { rt.stats(&owned).await })
            .await
            .map_err(|e| into_fence("stats", id, e))
    }
}
