use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use edgesync_core::manifest::RevisionManifest;
use serde_json::json;

use crate::api::form_file;
use crate::error::ServerError;
use crate::state::AppState;

/// POST /upload
///
/// Stores the `upload` part under its MD5 digest and answers with the
/// fragment `{"<file name>": {"hash": "<digest>"}}`.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let file = form_file(multipart, "upload").await?;
    let digest = state.content.save(file.data, &state.upload_hooks).await?;
    let filename = file.file_name.unwrap_or_else(|| digest.clone());

    tracing::info!(filename = %filename, digest = %digest, "upload stored");
    Ok(Json(RevisionManifest::upload_fragment(filename, digest)))
}

/// GET /download/{hash}
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.content.fetch(&hash).await?;
    tracing::debug!(hash = %hash, size = data.len(), "content downloaded");
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}

/// GET /delete/{hash}
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    state.content.delete(&hash).await?;
    Ok(Json(json!({ "deleted": hash })))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{get, post_form, send, send_json, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_upload_returns_fragment() {
        let app = test_app();
        let (status, body) = send_json(&app, post_form("/upload", None, "upload", "filename.ext", b"file content")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"filename.ext": {"hash": "d10b4c3ff123b26dc068d43a8bef2d23"}}));
        assert!(app.roots.content_dir.join("d1/d10b4c3ff123b26dc068d43a8bef2d23").exists());
    }

    #[tokio::test]
    async fn test_download_and_delete() {
        let app = test_app();
        send(&app, post_form("/upload", None, "upload", "a.txt", b"file content")).await;
        let digest = "d10b4c3ff123b26dc068d43a8bef2d23";

        let (status, body) = send(&app, get(&format!("/download/{digest}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"file content");

        let (status, _) = send(&app, get(&format!("/delete/{digest}"), None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, get(&format!("/delete/{digest}"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, get(&format!("/download/{digest}"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let app = test_app();

        let (status, _) = send(&app, get("/download/zz", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(&app, post_form("/upload", None, "other", "a.txt", b"x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("upload"));
    }
}
