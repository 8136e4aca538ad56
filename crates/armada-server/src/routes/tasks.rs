use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use armada_core::queue::{PendingTask, TaskDb, TaskState};
use armada_core::{paths, ArmadaError};

use crate::error::AppError;
use crate::state::AppState;

fn open_db(root: &std::path::Path) -> Result<TaskDb, ArmadaError> {
    TaskDb::open(&paths::queue_db_path(root))
}

fn parse_task_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse::<Uuid>()
        .map_err(|_| AppError::bad_request(format!("malformed task id '{raw}'")))
}

#[derive(serde::Deserialize)]
pub struct ListQuery {
    pub subject: Option<String>,
    pub state: Option<String>,
    pub task_type: Option<String>,
}

/// GET /api/tasks — list tasks, oldest first, with optional filters.
pub async fn list_tasks(
    State(app): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PendingTask>>, AppError> {
    let state = match &query.state {
        Some(raw) => Some(raw.parse::<TaskState>()?),
        None => None,
    };
    let root = app.root.clone();
    let tasks = tokio::task::spawn_blocking(move || {
        open_db(&root)?.find(query.subject.as_deref(), state, query.task_type.as_deref())
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(tasks))
}

#[derive(serde::Deserialize)]
pub struct EnqueueBody {
    pub subject_resource_id: String,
    pub task_type: String,
    pub action_key: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// "ready" (default) or "not-ready".
    pub initial_state: Option<String>,
    pub associated_resource_id: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// POST /api/tasks — enqueue a pending task.
pub async fn enqueue_task(
    State(app): State<AppState>,
    Json(body): Json<EnqueueBody>,
) -> Result<Json<PendingTask>, AppError> {
    let initial_state = match &body.initial_state {
        Some(raw) => raw.parse::<TaskState>()?,
        None => TaskState::Ready,
    };
    let root = app.root.clone();
    let task = tokio::task::spawn_blocking(move || {
        let task = PendingTask::new(
            body.subject_resource_id,
            body.task_type,
            body.action_key,
            body.payload,
            initial_state,
            body.associated_resource_id,
            body.description,
        )?;
        open_db(&root)?.insert(&task)?;
        Ok::<_, ArmadaError>(task)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(task))
}

/// GET /api/tasks/:id — fetch one task.
pub async fn get_task(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PendingTask>, AppError> {
    let id = parse_task_id(&id)?;
    let root = app.root.clone();
    let task = tokio::task::spawn_blocking(move || open_db(&root)?.get(id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(task))
}

/// POST /api/tasks/:id/force-ready — operator override returning a task to
/// `ready` outside the normal lifecycle.
pub async fn force_ready(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PendingTask>, AppError> {
    let id = parse_task_id(&id)?;
    let root = app.root.clone();
    let task = tokio::task::spawn_blocking(move || open_db(&root)?.force_ready(id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(task))
}
