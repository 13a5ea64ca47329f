//! Work request intake

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use adcsync_types::{is_envelope_key, WorkRequest};
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

/// Submit request response
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub request_id: String,
    pub queued: bool,
}

/// Queue a desired-state update for the deployer loop
pub async fn submit_request(
    State(state): State<AppState>,
    Json(request): Json<WorkRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    validate_fragments(&request)?;

    let request_id = request.id.to_string();
    tracing::info!(
        request_id = %request_id,
        event = ?request.event,
        resources = request.resources.len(),
        configmaps = request.configmaps.len(),
        "Queueing work request"
    );
    state.deployer.submit(request)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            request_id,
            queued: true,
        }),
    ))
}

fn validate_fragments(request: &WorkRequest) -> ApiResult<()> {
    let resources = request.resources.iter();
    let configmaps = request.configmaps.iter().flat_map(|cm| cm.tenants.iter());

    for (tenant, body) in resources.chain(configmaps) {
        if tenant.is_empty() {
            return Err(ApiError::BadRequest("Tenant name must not be empty".into()));
        }
        if is_envelope_key(tenant) {
            return Err(ApiError::BadRequest(format!(
                "Tenant name {} is reserved for the declaration envelope",
                tenant
            )));
        }
        if !body.is_object() {
            return Err(ApiError::BadRequest(format!(
                "Fragment for tenant {} must be a JSON object",
                tenant
            )));
        }
    }
    Ok(())
}
