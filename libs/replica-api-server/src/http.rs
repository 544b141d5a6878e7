use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use replica_api::protocol::{
    CallRequest, CallResponse, CanisterStatus, InstallRequest, InstallResponse, InstanceInfo,
    TickRequest, TickResponse, TimeBody, UpgradeRequest,
};
use replica_api::CanisterId;

use crate::error::ServerError;
use crate::instances::InstancePool;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) pool: Arc<InstancePool>,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/instances", post(handle_create_instance))
        .route("/instances/{id}", axum::routing::delete(handle_delete_instance))
        .route("/instances/{id}/time", get(handle_get_time).post(handle_advance_time))
        .route("/instances/{id}/tick", post(handle_tick))
        .route("/instances/{id}/canisters", post(handle_install))
        .route("/instances/{id}/canisters/{cid}", get(handle_status))
        .route("/instances/{id}/canisters/{cid}/upgrade", post(handle_upgrade))
        .route("/instances/{id}/canisters/{cid}/call", post(handle_call))
        .with_state(state)
}

fn parse_canister_id(raw: &str) -> Result<CanisterId, ServerError> {
    raw.parse().map_err(|e: replica_api::id::ParseCanisterIdError| ServerError::BadRequest(e.to_string()))
}

// --- POST /instances ---

async fn handle_create_instance(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<InstanceInfo>), ServerError> {
    let instance_id = state.pool.create()?;
    Ok((StatusCode::CREATED, Json(InstanceInfo { instance_id })))
}

// --- DELETE /instances/{id} ---

async fn handle_delete_instance(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<StatusCode, ServerError> {
    let Path(id) = path?;
    state.pool.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- GET /instances/{id}/time ---

async fn handle_get_time(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<TimeBody>, ServerError> {
    let Path(id) = path?;
    let replica = state.pool.get(id)?;
    let nanos = replica.lock().await.time();
    Ok(Json(TimeBody { nanos }))
}

// --- POST /instances/{id}/time {nanos} -> advance ---

async fn handle_advance_time(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    body: Result<Json<TimeBody>, JsonRejection>,
) -> Result<Json<TimeBody>, ServerError> {
    let Path(id) = path?;
    let Json(body) = body?;
    let replica = state.pool.get(id)?;
    let mut replica = replica.lock().await;
    replica.advance_time(Duration::from_nanos(body.nanos));
    Ok(Json(TimeBody { nanos: replica.time() }))
}

// --- POST /instances/{id}/tick {times} ---

async fn handle_tick(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    body: Result<Json<TickRequest>, JsonRejection>,
) -> Result<Json<TickResponse>, ServerError> {
    let Path(id) = path?;
    let Json(body) = body?;
    let replica = state.pool.get(id)?;
    let executed = replica.lock().await.tick(body.times);
    tracing::debug!(instance = id, requested = body.times, executed, "tick");
    Ok(Json(TickResponse { executed }))
}

// --- POST /instances/{id}/canisters ---

async fn handle_install(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    body: Result<Json<InstallRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<InstallResponse>), ServerError> {
    let Path(id) = path?;
    let Json(body) = body?;
    let replica = state.pool.get(id)?;
    let canister_id = replica
        .lock()
        .await
        .install(&body.module, body.arg.as_deref())
        .map_err(|e| e.with_context(format!("instance {id}")))?;
    Ok((StatusCode::CREATED, Json(InstallResponse { canister_id })))
}

// --- GET /instances/{id}/canisters/{cid} ---

async fn handle_status(
    State(state): State<AppState>,
    path: Result<Path<(u64, String)>, PathRejection>,
) -> Result<Json<CanisterStatus>, ServerError> {
    let Path((id, cid)) = path?;
    let canister_id = parse_canister_id(&cid)?;
    let replica = state.pool.get(id)?;
    let status = replica.lock().await.status(canister_id)?;
    Ok(Json(status))
}

// --- POST /instances/{id}/canisters/{cid}/upgrade ---

async fn handle_upgrade(
    State(state): State<AppState>,
    path: Result<Path<(u64, String)>, PathRejection>,
    body: Result<Json<UpgradeRequest>, JsonRejection>,
) -> Result<StatusCode, ServerError> {
    let Path((id, cid)) = path?;
    let Json(body) = body?;
    let canister_id = parse_canister_id(&cid)?;
    let replica = state.pool.get(id)?;
    replica
        .lock()
        .await
        .upgrade(canister_id, &body.module, body.arg.as_deref(), body.options)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- POST /instances/{id}/canisters/{cid}/call ---

async fn handle_call(
    State(state): State<AppState>,
    path: Result<Path<(u64, String)>, PathRejection>,
    body: Result<Json<CallRequest>, JsonRejection>,
) -> Result<Json<CallResponse>, ServerError> {
    let Path((id, cid)) = path?;
    let Json(body) = body?;
    let canister_id = parse_canister_id(&cid)?;
    let replica = state.pool.get(id)?;
    let reply = replica.lock().await.call(canister_id, &body.method, &body.arg)?;
    Ok(Json(CallResponse { reply }))
}
