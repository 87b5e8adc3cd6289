//! slotgrid-api — REST API for SlotGrid.
//!
//! Provides axum route handlers for registering tasks and groups, recording
//! slot allocations, and reading the current capacity decision.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/tasks` | List all tasks |
//! | POST | `/api/v1/tasks` | Submit a task |
//! | GET | `/api/v1/tasks/{id}` | Get a task |
//! | DELETE | `/api/v1/tasks/{id}` | Remove a completed or cancelled task |
//! | POST | `/api/v1/tasks/{id}/allocation` | Record granted slots |
//! | GET | `/api/v1/groups` | List all groups |
//! | POST | `/api/v1/groups` | Register or update a group |
//! | GET | `/api/v1/groups/{id}` | Get a group |
//! | DELETE | `/api/v1/groups/{id}` | Remove a group |
//! | GET | `/api/v1/capacity` | Desired agent count for the current ledger |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use slotgrid_autoscale::AutoscaleSettings;
use slotgrid_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub settings: AutoscaleSettings,
}

/// Build the complete API router (REST + metrics).
pub fn build_router(store: StateStore, settings: AutoscaleSettings) -> Router {
    let api_state = ApiState { store, settings };

    let api_routes = Router::new()
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route("/tasks/{id}", get(handlers::get_task).delete(handlers::delete_task))
        .route("/tasks/{id}/allocation", post(handlers::set_allocation))
        .route("/groups", get(handlers::list_groups).post(handlers::put_group))
        .route("/groups/{id}", get(handlers::get_group).delete(handlers::delete_group))
        .route("/capacity", get(handlers::capacity))
        .with_state(api_state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state))
}
