use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use armada_core::store::{fields, RedbStore, ResourceStore};
use armada_core::{guard, paths, ArmadaError};

use crate::error::AppError;
use crate::state::AppState;

fn open_store(root: &std::path::Path) -> Result<RedbStore, ArmadaError> {
    RedbStore::open(&paths::meta_db_path(root))
}

/// GET /api/resources/:id/record — the execution record, if a command is in
/// flight for the resource.
pub async fn get_record(
    State(app): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let store = open_store(&root)?;
        let record = guard::current(&store, &resource_id)?;
        let pending = store.get(&resource_id, fields::PENDING_TASK)?;
        Ok::<_, ArmadaError>(match record {
            Some(record) => serde_json::json!({
                "resource_id": resource_id,
                "busy": true,
                "action": record.action,
                "args": record.args,
                "pending_task": pending,
            }),
            None => serde_json::json!({
                "resource_id": resource_id,
                "busy": false,
                "pending_task": pending,
            }),
        })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// DELETE /api/resources/:id/record — manual clear of a stuck resource.
///
/// This is the operator remedy for a completion that never arrived: the
/// record and the pending-task pointer are both dropped, making the resource
/// dispatchable again. Idempotent.
pub async fn clear_record(
    State(app): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let root = app.root.clone();
    tokio::task::spawn_blocking(move || {
        let store = open_store(&root)?;
        guard::release(&store, &resource_id)?;
        store.delete(&resource_id, fields::PENDING_TASK)?;
        tracing::info!(resource = %resource_id, "execution record cleared manually");
        Ok::<_, ArmadaError>(())
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(StatusCode::NO_CONTENT)
}
