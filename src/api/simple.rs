/// PEP 503 simple repository pages
use crate::{
    access::{Caller, Operation},
    context::AppContext,
    error::{IndexError, IndexResult},
    storage::ProjectFileInfo,
};
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use std::fmt::Write;
use tracing::debug;

/// Build simple index routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/simple/", get(simple_index))
        .route("/simple/:project/", get(project_index))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn page(title: &str, links: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n  <head>\n    <meta name=\"pypi:repository-version\" content=\"1.0\">\n    <title>{title}</title>\n  </head>\n  <body>\n    <h1>{title}</h1>\n{links}  </body>\n</html>\n",
        title = escape_html(title),
        links = links
    )
}

fn render_index(projects: &[String]) -> String {
    let mut links = String::from("    <ul>\n");
    for project in projects {
        let project = escape_html(project);
        let _ = writeln!(links, "      <li><a href=\"{0}/\">{0}</a></li>", project);
    }
    links.push_str("    </ul>\n");
    page("Simple Index", &links)
}

fn render_project(project: &str, files: &[ProjectFileInfo]) -> String {
    let mut links = String::new();
    for file in files {
        let _ = writeln!(
            links,
            "    <a href=\"../../artifacts/{}/{}/{}\">{}</a><br>",
            escape_html(&file.project_name),
            escape_html(&file.version),
            escape_html(&file.filename),
            escape_html(&file.filename),
        );
    }
    page(&format!("Links for {}", project), &links)
}

/// Root index listing every project
async fn simple_index(State(ctx): State<AppContext>, caller: Caller) -> IndexResult<Html<String>> {
    caller.authorize(&ctx, Operation::Read, None).await?;

    let projects = ctx.backend.list_projects().await?;
    Ok(Html(render_index(&projects)))
}

/// Project page linking every artifact, or a redirect to the upstream index
async fn project_index(
    State(ctx): State<AppContext>,
    Path(project): Path<String>,
    caller: Caller,
) -> IndexResult<Response> {
    caller.authorize(&ctx, Operation::Read, Some(&project)).await?;

    let files = ctx.backend.list_files(&project).await?;
    if !files.is_empty() {
        return Ok(Html(render_project(&project, &files)).into_response());
    }

    match ctx.fallback_url() {
        Some(url) => {
            let target = format!("{}/{}/", url.trim_end_matches('/'), project);
            debug!("Project {} not found locally, redirecting to {}", project, target);
            Ok(Redirect::temporary(&target).into_response())
        }
        None => Err(IndexError::NotFound(format!("Project {} not found.", project))),
    }
}
