/// Artifact download and removal endpoints
use crate::{
    access::{Caller, Operation},
    context::AppContext,
    error::{IndexError, IndexResult},
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};
use tracing::info;

const CHECKSUM_HEADER: HeaderName = HeaderName::from_static("x-checksum-sha256");

/// Build artifact routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/artifacts/:project/:version/:filename",
            get(get_artifact).delete(delete_artifact),
        )
        .route("/delete/:project/:version", delete(delete_version))
}

/// Content type for a distribution filename
fn guess_content_type(filename: &str) -> &'static str {
    if filename.ends_with(".whl") || filename.ends_with(".zip") || filename.ends_with(".egg") {
        "application/zip"
    } else if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        "application/gzip"
    } else {
        "application/octet-stream"
    }
}

fn header_value(value: String) -> IndexResult<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|e| IndexError::Internal(format!("Invalid header value: {}", e)))
}

/// Download an artifact
///
/// The SHA-256 digest doubles as a strong ETag, so `If-None-Match` revalidation answers 304.
async fn get_artifact(
    State(ctx): State<AppContext>,
    Path((project, version, filename)): Path<(String, String, String)>,
    caller: Caller,
    headers: HeaderMap,
) -> IndexResult<Response> {
    caller.authorize(&ctx, Operation::Read, Some(&project)).await?;

    let contents = ctx
        .backend
        .get_contents(&project, &version, &filename)
        .await?
        .ok_or_else(|| {
            IndexError::NotFound(format!("File {} for project {} not found.", filename, project))
        })?;

    let etag = header_value(format!("\"{}\"", contents.sha256_digest))?;

    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        if *if_none_match == etag {
            return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
        }
    }

    let disposition = header_value(format!("attachment; filename=\"{}\"", contents.filename))?;
    let checksum = header_value(contents.sha256_digest)?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(guess_content_type(&contents.filename)),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (header::ETAG, etag),
            (CHECKSUM_HEADER, checksum),
        ],
        Body::from(contents.content),
    )
        .into_response())
}

/// Remove a single artifact
async fn delete_artifact(
    State(ctx): State<AppContext>,
    Path((project, version, filename)): Path<(String, String, String)>,
    caller: Caller,
) -> IndexResult<StatusCode> {
    caller.authorize(&ctx, Operation::Delete, Some(&project)).await?;

    if !ctx.backend.delete_file(&project, &version, &filename).await? {
        return Err(IndexError::NotFound(format!(
            "File {} for project {} not found.",
            filename, project
        )));
    }

    info!("Deleted {} from project {} version {}", filename, project, version);
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every artifact of a version
async fn delete_version(
    State(ctx): State<AppContext>,
    Path((project, version)): Path<(String, String)>,
    caller: Caller,
) -> IndexResult<StatusCode> {
    caller.authorize(&ctx, Operation::Delete, Some(&project)).await?;

    if !ctx.backend.delete_version(&project, &version).await? {
        return Err(IndexError::NotFound(format!(
            "Project {} version {} not found.",
            project, version
        )));
    }

    info!("Deleted version {} of project {}", version, project);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::test_support::{body_bytes, body_json, ReadOnly, TestApp, WHEEL},
        storage::digest::compute_digest,
    };
    use axum::http::Request;
    use std::sync::Arc;

    fn delete_request(uri: &str) -> Request<Body> {
        Request::delete(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(WHEEL), "application/zip");
        assert_eq!(guess_content_type("testproj-0.1.0.tar.gz"), "application/gzip");
        assert_eq!(guess_content_type("README"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_get_artifact() {
        let app = TestApp::new();
        app.seed("testproj", "0.1.0", WHEEL, b"fake wheel content").await;

        let response = app
            .get(&format!("/fast-pypi/artifacts/testproj/0.1.0/{}", WHEEL))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let digest = compute_digest(b"fake wheel content");
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"{}\"", WHEEL).as_str()
        );
        assert_eq!(headers[header::ETAG], format!("\"{}\"", digest).as_str());
        assert_eq!(headers["x-checksum-sha256"], digest.as_str());

        assert_eq!(&body_bytes(response).await[..], b"fake wheel content");
    }

    #[tokio::test]
    async fn test_get_artifact_revalidation() {
        let app = TestApp::new();
        app.seed("testproj", "0.1.0", WHEEL, b"fake wheel content").await;

        let etag = format!("\"{}\"", compute_digest(b"fake wheel content"));
        let response = app
            .send(
                Request::get(format!("/fast-pypi/artifacts/testproj/0.1.0/{}", WHEEL))
                    .header(header::IF_NONE_MATCH, etag.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_get_artifact_not_found() {
        let app = TestApp::new();

        let response = app
            .get("/fast-pypi/artifacts/testproj/0.1.0/testproj-0.1.0.tar.gz")
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["message"],
            "File testproj-0.1.0.tar.gz for project testproj not found."
        );
    }

    #[tokio::test]
    async fn test_delete_artifact() {
        let app = TestApp::new();
        app.seed("testproj", "0.1.0", WHEEL, b"fake wheel content").await;
        let uri = format!("/fast-pypi/artifacts/testproj/0.1.0/{}", WHEEL);

        assert_eq!(app.send(delete_request(&uri)).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(app.send(delete_request(&uri)).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.get(&uri).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_version() {
        let app = TestApp::new();
        app.seed("testproj", "0.1.0", WHEEL, b"fake wheel content").await;

        let response = app.send(delete_request("/fast-pypi/delete/testproj/0.1.0")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_bytes(response).await.is_empty());

        let response = app.send(delete_request("/fast-pypi/delete/testproj/0.1.0")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["message"],
            "Project testproj version 0.1.0 not found."
        );
    }

    #[tokio::test]
    async fn test_delete_requires_permission() {
        let app = TestApp::with_policy(Arc::new(ReadOnly));
        app.seed("testproj", "0.1.0", WHEEL, b"fake wheel content").await;

        let response = app.send(delete_request("/fast-pypi/delete/testproj/0.1.0")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await["message"],
            "You do not have permission to perform delete on project testproj."
        );

        // Nothing was removed
        let uri = format!("/fast-pypi/artifacts/testproj/0.1.0/{}", WHEEL);
        assert_eq!(app.get(&uri).await.status(), StatusCode::OK);
    }
}
