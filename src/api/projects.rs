/// JSON project management endpoints
use crate::{
    access::{Caller, Operation},
    context::AppContext,
    error::{IndexError, IndexResult},
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use tracing::info;

/// Build project routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/projects/", get(list_projects))
        .route("/projects/:project/versions/", get(list_versions))
        .route("/projects/:project/delete-versions/", post(delete_versions))
}

/// List all projects
async fn list_projects(
    State(ctx): State<AppContext>,
    caller: Caller,
) -> IndexResult<Json<Vec<String>>> {
    caller.authorize(&ctx, Operation::Read, None).await?;

    Ok(Json(ctx.backend.list_projects().await?))
}

/// List the versions of a project
async fn list_versions(
    State(ctx): State<AppContext>,
    Path(project): Path<String>,
    caller: Caller,
) -> IndexResult<Json<Vec<String>>> {
    caller.authorize(&ctx, Operation::Read, Some(&project)).await?;

    let versions = ctx.backend.list_versions(&project).await?;
    if versions.is_empty() {
        return Err(IndexError::NotFound(format!("Project {} not found.", project)));
    }
    Ok(Json(versions))
}

/// Delete several versions; responds with the ones that existed
async fn delete_versions(
    State(ctx): State<AppContext>,
    Path(project): Path<String>,
    caller: Caller,
    Json(versions): Json<Vec<String>>,
) -> IndexResult<Json<Vec<String>>> {
    caller.authorize(&ctx, Operation::Delete, Some(&project)).await?;

    let mut deleted = Vec::new();
    for version in versions {
        if ctx.backend.delete_version(&project, &version).await? {
            deleted.push(version);
        }
    }

    info!("Deleted versions {:?} of project {}", deleted, project);
    Ok(Json(deleted))
}
