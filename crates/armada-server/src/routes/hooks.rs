use axum::extract::State;
use axum::Json;

use armada_core::config::ArmadaConfig;
use armada_core::events::HandlerRegistry;
use armada_core::outcome::ScriptCatalog;
use armada_core::queue::TaskDb;
use armada_core::router::CompletionRouter;
use armada_core::store::RedbStore;
use armada_core::transcript::FileTranscripts;
use armada_core::{paths, ArmadaError};

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct CompleteBody {
    pub resource_id: String,
    pub token: String,
}

/// POST /hooks/complete — the completion entry point called by transports
/// and remote-side webhooks.
///
/// Always returns 200 for a well-formed request body: a token that does not
/// decode is reported as `processed: false` rather than an error, since the
/// caller (a remote script's curl) can do nothing useful with a failure.
pub async fn complete(
    State(app): State<AppState>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let config = ArmadaConfig::load(&root)?;
        let catalog = ScriptCatalog::from_config(&config)?;
        let store = RedbStore::open(&paths::meta_db_path(&root))?;
        let transcripts = FileTranscripts::new(&root);
        let tasks = TaskDb::open(&paths::queue_db_path(&root))?;
        let handlers = HandlerRegistry::new();

        let router =
            CompletionRouter::new(&store, &transcripts, &catalog, &handlers, Some(&tasks));
        let outcome = router.on_complete(&body.resource_id, &body.token)?;

        Ok::<_, ArmadaError>(match outcome {
            Some(o) => serde_json::json!({
                "processed": true,
                "verb": o.verb,
                "subject": o.subject,
                "success": o.success,
                "resolved_task": o.resolved_task,
            }),
            None => serde_json::json!({ "processed": false }),
        })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
