//! REST handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};
use uuid::Uuid;

use courier_core::{CourierError, TaskDetails, TaskInput};

use crate::server::GatewayState;

fn status_for(err: &CourierError) -> StatusCode {
    match err {
        CourierError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `GET /api/health`
pub async fn health(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "courier",
        "version": env!("CARGO_PKG_VERSION"),
        "tasks": state.supervisor.registry().len().await,
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    }))
}

/// `GET /api/tasks`
pub async fn list_tasks(State(state): State<GatewayState>) -> Json<Value> {
    let tasks = state.supervisor.list().await;
    Json(json!({ "tasks": tasks }))
}

/// `POST /api/tasks`
pub async fn submit_task(
    State(state): State<GatewayState>,
    Json(input): Json<TaskInput>,
) -> impl IntoResponse {
    let submission = state.supervisor.submit(input).await;
    let status = if submission.started {
        StatusCode::CREATED
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(submission))
}

/// `GET /api/tasks/:id`
pub async fn get_task(
    State(state): State<GatewayState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskDetails>, StatusCode> {
    state.supervisor.details(task_id).await.map(Json).map_err(|e| {
        tracing::debug!(task_id = %task_id, error = %e, "Status query failed");
        status_for(&e)
    })
}

/// `POST /api/tasks/:id/stop`
pub async fn stop_task(
    State(state): State<GatewayState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskDetails>, StatusCode> {
    state.supervisor.stop(task_id).await.map(Json).map_err(|e| {
        tracing::warn!(task_id = %task_id, error = %e, "Stop request failed");
        status_for(&e)
    })
}
