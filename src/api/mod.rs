/// API routes and handlers
pub mod artifacts;
pub mod health;
pub mod projects;
pub mod simple;
pub mod upload;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(simple::routes())
        .merge(artifacts::routes())
        .merge(upload::routes())
        .merge(projects::routes())
}
