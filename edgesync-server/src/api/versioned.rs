use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use edgesync_core::manifest::RevisionManifest;
use edgesync_core::sync::FailurePolicy;
use serde::Deserialize;

use crate::api::{form_file, relative};
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WarmupQuery {
    /// Revision whose cached manifest fills gaps in the uploaded one.
    pub base: Option<String>,
    pub policy: Option<FailurePolicy>,
}

/// GET /api/manifest/{project}/{tag}
pub async fn get_manifest(
    State(state): State<Arc<AppState>>,
    Path((project, tag)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    let manifest = state.versioned.get_manifest(&project, &tag).await?;
    Ok(Json(manifest))
}

/// POST /api/warmup/{project}?base={rev}&policy={fail-fast|best-effort}
///
/// Warms the cache from the `manifest` part. Failed revision groups are
/// listed in the report unless `policy=fail-fast` is given.
pub async fn warm_up(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
    Query(params): Query<WarmupQuery>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let manifest = read_manifest(multipart).await?;
    let policy = params.policy.unwrap_or(FailurePolicy::BestEffort);

    let report = state
        .versioned
        .warm_up(&project, manifest, params.base.as_deref(), policy)
        .await?;
    Ok(Json(report))
}

/// GET /{project}/{name}.{rev}.{ext}
pub async fn get_uncached_file(
    State(state): State<Arc<AppState>>,
    Path((project, filepath)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state
        .versioned
        .get_uncached_file(&project, relative(&filepath))
        .await?;
    Ok(data)
}

/// Parse the `manifest` part of a multipart body.
pub async fn read_manifest(multipart: Multipart) -> Result<RevisionManifest, ServerError> {
    let file = form_file(multipart, "manifest").await?;
    RevisionManifest::from_json(&file.data)
        .map_err(|e| ServerError::BadRequest(format!("can't parse manifest: {e}")))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{get, post_form, send, send_json, test_app, TOKEN};
    use axum::http::StatusCode;
    use edgesync_core::hash::git_blob_hash;
    use serde_json::json;

    const REV: &str = "1234567";

    #[tokio::test]
    async fn test_manifest_lists_static_files() {
        let app = test_app();
        let (status, body) = send_json(&app, get("/api/manifest/web/v1", Some(TOKEN))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"public/app.js": {"version": REV, "hash": git_blob_hash(b"console.log(1)")}})
        );
        assert!(app.roots.cache_dir.join("web/app.js").exists());
        assert!(app.roots.cache_dir.join(format!("web/{REV}.json")).exists());

        let (status, _) = send_json(&app, get("/api/manifest/web/v9", Some(TOKEN))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let (status, _) = send_json(&app, get("/api/manifest/ghost/v1", Some(TOKEN))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_warm_up_reports_groups() {
        let app = test_app();
        let manifest = format!(r#"{{"public/app.js": {{"version": "{REV}"}}}}"#);
        let (status, body) = send_json(
            &app,
            post_form("/api/warmup/web", Some(TOKEN), "manifest", "manifest.json", manifest.as_bytes()),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["warmed"], json!([REV]));
        assert_eq!(body["files"], json!(1));

        let (status, _) = send_json(
            &app,
            post_form("/api/warmup/web", Some(TOKEN), "manifest", "manifest.json", b"not json"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_warm_up_fail_fast_policy() {
        let app = test_app();
        let manifest = br#"{"public/app.js": {"version": "7654321"}}"#;
        let (status, body) = send_json(
            &app,
            post_form("/api/warmup/web?policy=best-effort", Some(TOKEN), "manifest", "m.json", manifest),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["failed"][0]["revision"], json!("7654321"));

        let (status, _) = send_json(
            &app,
            post_form("/api/warmup/web?policy=fail-fast", Some(TOKEN), "manifest", "m.json", manifest),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_versioned_file_is_fetched_and_cached() {
        let app = test_app();

        let (status, body) = send(&app, get(&format!("/web/app.{REV}.js"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"console.log(1)");
        assert!(app.roots.cache_dir.join("web/app.js").exists());

        let (status, _) = send(&app, get("/web/app.123456.js", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get(&format!("/web/app.js.{REV}.map"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
