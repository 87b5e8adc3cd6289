//! REST API handlers.
//!
//! Each handler reads/writes via `StateStore` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;

use slotgrid_autoscale::{evaluate_snapshot, render_prometheus};
use slotgrid_state::*;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn internal_error(e: StateError) -> axum::response::Response {
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

// ── Tasks ──────────────────────────────────────────────────────

/// GET /api/v1/tasks
pub async fn list_tasks(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_tasks() {
        Ok(tasks) => ApiResponse::ok(tasks).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/v1/tasks/{id}
pub async fn get_task(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.get_task(&id) {
        Ok(Some(task)) => ApiResponse::ok(task).into_response(),
        Ok(None) => error_response("task not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /api/v1/tasks
///
/// Task ids are unique; resubmitting a known id is a conflict.
pub async fn create_task(
    State(state): State<ApiState>,
    Json(task): Json<TaskRecord>,
) -> impl IntoResponse {
    match state.store.insert_task(&task) {
        Ok(()) => {
            info!(task = %task.id, slots_needed = task.slots_needed, "task submitted");
            (StatusCode::CREATED, ApiResponse::ok(task)).into_response()
        }
        Err(StateError::DuplicateTask(_)) => {
            error_response("task already exists", StatusCode::CONFLICT).into_response()
        }
        Err(e) => internal_error(e),
    }
}

/// DELETE /api/v1/tasks/{id}
pub async fn delete_task(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_task(&id) {
        Ok(true) => {
            info!(task = %id, "task removed");
            ApiResponse::ok("deleted").into_response()
        }
        Ok(false) => error_response("task not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Allocation request body.
#[derive(serde::Deserialize)]
pub struct AllocationRequest {
    pub slots_allocated: u32,
}

/// POST /api/v1/tasks/{id}/allocation
pub async fn set_allocation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<AllocationRequest>,
) -> impl IntoResponse {
    match state.store.set_task_allocation(&id, req.slots_allocated) {
        Ok(task) => ApiResponse::ok(task).into_response(),
        Err(StateError::NotFound(_)) => {
            error_response("task not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => internal_error(e),
    }
}

// ── Groups ─────────────────────────────────────────────────────

/// GET /api/v1/groups
pub async fn list_groups(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_groups() {
        Ok(groups) => ApiResponse::ok(groups).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/v1/groups/{id}
pub async fn get_group(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.get_group(&id) {
        Ok(Some(group)) => ApiResponse::ok(group).into_response(),
        Ok(None) => error_response("group not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /api/v1/groups
///
/// Registers a group or updates its weight and ceiling.
pub async fn put_group(
    State(state): State<ApiState>,
    Json(group): Json<GroupRecord>,
) -> impl IntoResponse {
    if group.weight.is_nan() || group.weight <= 0.0 {
        return error_response("group weight must be positive", StatusCode::BAD_REQUEST)
            .into_response();
    }
    match state.store.put_group(&group) {
        Ok(()) => {
            info!(group = %group.id, max_slots = ?group.max_slots, "group registered");
            ApiResponse::ok(group).into_response()
        }
        Err(e) => internal_error(e),
    }
}

/// DELETE /api/v1/groups/{id}
pub async fn delete_group(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_group(&id) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("group not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal_error(e),
    }
}

// ── Capacity ───────────────────────────────────────────────────

/// GET /api/v1/capacity
pub async fn capacity(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.snapshot() {
        Ok(snapshot) => ApiResponse::ok(evaluate_snapshot(&snapshot, state.settings)).into_response(),
        Err(e) => internal_error(e),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.snapshot() {
        Ok(snapshot) => {
            let body = render_prometheus(&evaluate_snapshot(&snapshot, state.settings));
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
                .into_response()
        }
        Err(e) => internal_error(e),
    }
}
