//! Operational HTTP endpoints.
//!
//! - `/`        : service info
//! - `/health`  : liveness plus a bounded runtime ping
//! - `/metrics` : Prometheus text format

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

pub const SERVICE_NAME: &str = "dockfence";

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub instance_id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub runtime: &'static str,
}

pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        instance_id: state.owner().instance().to_string(),
    })
}

/// Always 200; the body says whether the daemon answered the ping.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let report = if state.runtime().ping().await {
        HealthReport {
            status: "healthy",
            runtime: "connected",
        }
    } else {
        HealthReport {
            status: "unhealthy",
            runtime: "disconnected",
        }
    };
    Json(report)
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics().render();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
