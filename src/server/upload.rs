//! Image upload and retrieval

use super::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Value, json};

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "pdf"];

/// Lowercased extension if it is one we accept
fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Keep ASCII alphanumerics, `.`, `_` and `-`; whitespace becomes `_`
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// `<stem>_<timestamp>.<ext>` so repeated uploads never collide
fn stored_name(sanitized: &str, ext: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S%6f");
    // ".png" sanitizes to "png", which has no stem left
    let stem = sanitized.rsplit_once('.').map_or("", |(stem, _)| stem);
    let stem = if stem.is_empty() { "upload" } else { stem };
    format!("{}_{}.{}", stem, timestamp, ext)
}

fn content_type(filename: &str) -> &'static str {
    match allowed_extension(filename).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// `POST /upload-image`
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::bad_request("No image uploaded"));
    };
    if filename.is_empty() {
        return Err(ApiError::bad_request("Empty filename"));
    }
    let Some(ext) = allowed_extension(&filename) else {
        return Err(ApiError::bad_request("File type not allowed"));
    };

    let name = stored_name(&sanitize_filename(&filename), &ext);
    tokio::fs::create_dir_all(state.uploads_dir.as_path()).await?;
    let path = state.uploads_dir.join(&name);
    tokio::fs::write(&path, &bytes).await?;
    tracing::info!(file = %name, bytes = bytes.len(), "image uploaded");

    let analysis = if state.ocr_available && state.config.ocr.wants(&filename) {
        match state.ocr.extract_text(&path).await {
            Ok(text) => json!({ "extracted_text": text }),
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "OCR failed");
                json!({ "error": e.to_string() })
            }
        }
    } else {
        Value::Null
    };

    Ok(Json(json!({
        "url": format!("/uploads/{}", name),
        "analysis": analysis,
    })))
}

/// `GET /uploads/:filename`
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!(filename = %filename, "rejected suspicious upload path");
        return Err(ApiError::bad_request("Invalid filename"));
    }

    let path = state.uploads_dir.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            [
                (header::CONTENT_TYPE, content_type(&filename)),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound),
        Err(e) => Err(e.into()),
    }
}
