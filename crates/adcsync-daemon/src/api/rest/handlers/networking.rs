//! Networking snapshot handler

use crate::api::rest::state::AppState;
use adcsync_types::NetworkingSnapshot;
use axum::{extract::State, Json};

/// Pool members of the request last applied or attempted
pub async fn networking_snapshot(State(state): State<AppState>) -> Json<NetworkingSnapshot> {
    Json(state.networking.borrow().clone())
}
