/// Legacy upload API used by twine, uv and poetry
use crate::{
    access::{Caller, Operation},
    context::AppContext,
    error::{IndexError, IndexResult},
};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    routing::post,
    Router,
};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{info, warn};

/// Build upload routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/upload/", post(upload_file))
}

/// Validated upload form
#[derive(Debug)]
pub struct UploadForm {
    pub name: String,
    pub version: String,
    pub filetype: String,
    pub sha256_digest: Option<String>,
    pub filename: String,
    pub content: Bytes,
}

fn bad_form(e: MultipartError) -> IndexError {
    IndexError::Validation(format!("Malformed upload form: {}", e))
}

impl UploadForm {
    /// Read every multipart field; metadata fields other than the ones checked here are ignored
    pub async fn from_multipart(mut multipart: Multipart) -> IndexResult<Self> {
        let mut fields: HashMap<String, String> = HashMap::new();
        let mut file: Option<(Option<String>, Bytes)> = None;

        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "content" {
                let filename = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(bad_form)?;
                file = Some((filename, data));
            } else {
                let value = field.text().await.map_err(bad_form)?;
                fields.insert(name, value);
            }
        }

        Self::from_parts(fields, file)
    }

    fn from_parts(
        mut fields: HashMap<String, String>,
        file: Option<(Option<String>, Bytes)>,
    ) -> IndexResult<Self> {
        let mut required = |key: &str| {
            fields
                .remove(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| IndexError::Validation(format!("Missing form field '{}'", key)))
        };

        let action = required(":action")?;
        if action != "file_upload" {
            return Err(IndexError::Validation(format!("Unsupported action '{}'", action)));
        }
        let protocol_version = required("protocol_version")?;
        if protocol_version != "1" {
            return Err(IndexError::Validation(format!(
                "Unsupported protocol version '{}'",
                protocol_version
            )));
        }

        let name = required("name")?;
        let version = required("version")?;
        let filetype = required("filetype")?;
        if filetype != "sdist" && filetype != "bdist_wheel" {
            return Err(IndexError::Validation(format!(
                "Unsupported filetype '{}'",
                filetype
            )));
        }

        let sha256_digest = fields
            .remove("sha256_digest")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let (filename, content) =
            file.ok_or_else(|| IndexError::Validation("Missing form field 'content'".to_string()))?;
        let filename = filename
            .filter(|f| !f.is_empty())
            .ok_or_else(|| IndexError::Validation("Filename is required.".to_string()))?;

        Ok(UploadForm {
            name,
            version,
            filetype,
            sha256_digest,
            filename,
            content,
        })
    }
}

/// Upload a distribution file
async fn upload_file(
    State(ctx): State<AppContext>,
    caller: Caller,
    multipart: Multipart,
) -> IndexResult<StatusCode> {
    let form = UploadForm::from_multipart(multipart).await?;

    caller.authorize(&ctx, Operation::Write, Some(&form.name)).await?;

    let size = form.content.len();
    let result = ctx
        .backend
        .upload(
            &form.name,
            &form.version,
            &form.filename,
            form.content,
            form.sha256_digest.as_deref(),
        )
        .await;

    if let Err(IndexError::FileExists { .. }) = &result {
        warn!(
            "Rejected upload of {} for project {} version {}: file exists",
            form.filename, form.name, form.version
        );
    }
    result?;

    info!(
        "Uploaded {} ({}, {} bytes) for project {} version {}",
        form.filename, form.filetype, size, form.name, form.version
    );
    Ok(StatusCode::CREATED)
}
