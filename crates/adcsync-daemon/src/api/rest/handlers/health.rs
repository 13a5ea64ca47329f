//! Health and status handlers

use crate::api::rest::state::AppState;
use adcsync_deployer::MailboxStats;
use adcsync_types::{DeployerResponse, DeployerStatus, VersionInfo};
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let status = if state.deployer.is_degraded() {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthCheckResponse {
        status: status.to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub appliance: VersionInfo,
    pub deployer: DeployerStatus,
    pub last_response: Option<DeployerResponse>,
    pub mailbox: MailboxStats,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    let last_response = state.last_response.read().await.clone();

    Json(DaemonStatusResponse {
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        appliance: state.appliance.clone(),
        deployer: state.deployer.status(),
        last_response,
        mailbox: state.deployer.responses().stats(),
    })
}
