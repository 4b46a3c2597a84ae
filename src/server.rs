/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{IndexError, IndexResult},
};
use axum::{extract::DefaultBodyLimit, http::StatusCode, response::Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let mount_path = ctx.config.service.mount_path.clone();
    let max_upload_size = ctx.config.service.max_upload_size;

    let api = crate::api::routes().with_state(ctx);

    let router = if mount_path.is_empty() {
        api
    } else {
        Router::new().nest(&mount_path, api)
    };

    router
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> IndexResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("fast-pypi listening on {}", addr);
    info!("   Mount path: {}", display_mount(&ctx.config.service.mount_path));
    info!("   Storage backend: {}", ctx.config.storage.backend);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| IndexError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| IndexError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

fn display_mount(mount_path: &str) -> &str {
    if mount_path.is_empty() {
        "/"
    } else {
        mount_path
    }
}
