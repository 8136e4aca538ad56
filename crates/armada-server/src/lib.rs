pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf) -> Router {
    let app_state = state::AppState::new(root);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Completion entry point
        .route("/hooks/complete", post(routes::hooks::complete))
        // Tasks
        .route("/api/tasks", get(routes::tasks::list_tasks))
        .route("/api/tasks", post(routes::tasks::enqueue_task))
        .route("/api/tasks/{id}", get(routes::tasks::get_task))
        .route(
            "/api/tasks/{id}/force-ready",
            post(routes::tasks::force_ready),
        )
        // Resources
        .route(
            "/api/resources/{id}/record",
            get(routes::resources::get_record).delete(routes::resources::clear_record),
        )
        .layer(cors)
        .with_state(app_state)
}

/// Start the armada API server on `port`.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let app = build_router(root);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("armada server listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
