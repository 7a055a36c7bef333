//! Container endpoints.
//!
//! Create: structural validation, policy, ownership tag, runtime.
//! Everything addressed by id: ownership check first, then the runtime call
//! against the authoritative id the check resolved.

use std::time::Duration;

use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::TryStreamExt;
use serde::Deserialize;

use dockfence_core::error::FenceError;
use dockfence_core::model::{
    ContainerList, CreateResponse, CreationRequest, LogsResponse, ManagedResource,
    MessageResponse, StatsSnapshot,
};

use crate::app_state::AppState;
use crate::context::{authorize, list_owned};
use crate::runtime::{LogOptions, RemoveOptions, StateChange};

use super::response::ApiError;

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Upper bound for a caller-supplied stop/restart grace period.
pub const MAX_GRACE_SECS: u64 = 300;
/// Log lines returned when the caller doesn't ask for a tail.
pub const DEFAULT_LOG_TAIL: u64 = 100;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub all: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self { all: true }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GraceQuery {
    /// Seconds before the runtime kills the container.
    pub timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RemoveQuery {
    pub force: bool,
    pub v: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogsQuery {
    pub stdout: bool,
    pub stderr: bool,
    /// `0` = everything (still capped by `runtime.max_log_tail`).
    pub tail: u64,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub follow: bool,
}

impl Default for LogsQuery {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: true,
            tail: DEFAULT_LOG_TAIL,
            since: None,
            until: None,
            follow: false,
        }
    }
}

fn grace_period(state: &AppState, q: &GraceQuery) -> ApiResult<Duration> {
    match q.timeout {
        Some(secs) if secs > MAX_GRACE_SECS => Err(FenceError::BadRequest(format!(
            "timeout must be at most {MAX_GRACE_SECS} seconds"
        ))
        .into()),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(Duration::from_secs(state.cfg().runtime.stop_grace_secs)),
    }
}

async fn owned(state: &AppState, id: &str) -> ApiResult<ManagedResource> {
    Ok(authorize(state.runtime(), state.owner(), state.metrics(), id).await?)
}

pub async fn list_containers(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ContainerList>> {
    let Query(q) = query?;
    let containers = list_owned(state.runtime(), state.owner(), state.metrics(), q.all).await?;
    Ok(Json(ContainerList::from(containers)))
}

pub async fn create_container(
    State(state): State<AppState>,
    body: Result<Json<CreationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateResponse>)> {
    let metrics = state.metrics();

    let req = match body {
        Ok(Json(req)) => req,
        Err(rej) => {
            metrics.create_requests.inc(&[("outcome", "invalid")]);
            return Err(rej.into());
        }
    };
    if let Err(e) = req.validate() {
        metrics.create_requests.inc(&[("outcome", "invalid")]);
        return Err(e.into());
    }

    let image = req.image.clone();
    let sanitized = match state.policy().evaluate(req).into_result() {
        Ok(s) => s,
        Err(reason) => {
            tracing::warn!(
                instance = %state.owner().instance(),
                %image,
                reason = reason.name(),
                detail = reason.detail().unwrap_or(""),
                "creation request rejected by policy"
            );
            metrics.policy_rejections.inc(&[("reason", reason.name())]);
            metrics.create_requests.inc(&[("outcome", "rejected")]);
            return Err(FenceError::from(reason).into());
        }
    };

    let tagged = state.owner().tag(sanitized);
    let created = match state.runtime().create(tagged).await {
        Ok(c) => c,
        Err(e) => {
            metrics.create_requests.inc(&[("outcome", "failed")]);
            return Err(e.into());
        }
    };

    metrics.create_requests.inc(&[("outcome", "created")]);
    tracing::info!(container_id = %created.id, name = %created.name, %image, "container created");
    Ok((
        StatusCode::CREATED,
        Json(CreateResponse {
            id: created.id,
            name: created.name,
            warnings: created.warnings,
        }),
    ))
}

pub async fn inspect_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ManagedResource>> {
    Ok(Json(owned(&state, &id).await?))
}

pub async fn start_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let resource = owned(&state, &id).await?;
    let message = match state.runtime().start(&resource.id).await? {
        StateChange::Changed => "Container started",
        StateChange::Unchanged => "Container already running",
    };
    tracing::info!(container_id = %resource.id, op = "start", "{message}");
    Ok(Json(MessageResponse::new(message, resource.id)))
}

pub async fn stop_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<GraceQuery>, QueryRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Query(q) = query?;
    let grace = grace_period(&state, &q)?;
    let resource = owned(&state, &id).await?;
    let message = match state.runtime().stop(&resource.id, grace).await? {
        StateChange::Changed => "Container stopped",
        StateChange::Unchanged => "Container already stopped",
    };
    tracing::info!(container_id = %resource.id, op = "stop", "{message}");
    Ok(Json(MessageResponse::new(message, resource.id)))
}

pub async fn restart_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<GraceQuery>, QueryRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Query(q) = query?;
    let grace = grace_period(&state, &q)?;
    let resource = owned(&state, &id).await?;
    state.runtime().restart(&resource.id, grace).await?;
    tracing::info!(container_id = %resource.id, op = "restart", "container restarted");
    Ok(Json(MessageResponse::new("Container restarted", resource.id)))
}

pub async fn remove_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<RemoveQuery>, QueryRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Query(q) = query?;
    let resource = owned(&state, &id).await?;
    let opts = RemoveOptions {
        force: q.force,
        volumes: q.v,
    };
    state.runtime().remove(&resource.id, opts).await?;
    tracing::info!(container_id = %resource.id, op = "remove", force = q.force, "container removed");
    Ok(Json(MessageResponse::new("Container removed", resource.id)))
}

pub async fn container_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(q) = query?;
    let max = state.cfg().runtime.max_log_tail;
    let tail = if q.tail == 0 { max } else { q.tail.min(max) };
    let opts = LogOptions {
        stdout: q.stdout,
        stderr: q.stderr,
        tail: Some(tail),
        since: q.since,
        until: q.until,
        follow: q.follow,
    };

    let resource = owned(&state, &id).await?;

    if q.follow {
        let stream = state.runtime().logs_stream(&resource.id, opts).await?;
        let container_id = resource.id.clone();
        let body = Body::from_stream(stream.inspect_err(move |e| {
            tracing::warn!(container_id = %container_id, error = %e, "log stream ended with error");
        }));
        return Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response());
    }

    let logs = state.runtime().logs_snapshot(&resource.id, opts).await?;
    Ok(Json(LogsResponse {
        logs,
        container_id: resource.id,
    })
    .into_response())
}

pub async fn container_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatsSnapshot>> {
    let resource = owned(&state, &id).await?;
    let sample = state.runtime().stats(&resource.id).await?;
    Ok(Json(StatsSnapshot::from_sample(resource.id, &sample)))
}
