use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use edgesync_core::sync::FailurePolicy;
use serde::Deserialize;
use serde_json::json;

use crate::api::versioned::read_manifest;
use crate::api::{form_file, relative};
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PolicyQuery {
    pub policy: Option<FailurePolicy>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveQuery {
    pub recursive: Option<String>,
}

/// POST /api/update/{project}/{filename}
///
/// Replaces a static file and re-synchronizes every reachable replica. On
/// failure the previous file is restored and the error names the step.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path((project, filename)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let file = form_file(multipart, "upload").await?;
    let fragment = state.sync.update(&project, relative(&filename), file.data).await?;
    Ok(Json(fragment))
}

/// POST /api/update-from-git/{project}?policy={fail-fast|best-effort}
pub async fn update_from_git(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
    Query(params): Query<PolicyQuery>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let manifest = read_manifest(multipart).await?;
    let policy = params.policy.unwrap_or(FailurePolicy::FailFast);

    let report = state.sync.update_from_git(&project, &manifest, policy).await?;
    Ok(Json(report))
}

/// POST /api/upload/{project}/{filename}
///
/// Writes a static file without touching replicas.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path((project, filename)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let file = form_file(multipart, "upload").await?;
    let fragment = state.sync.upload(&project, relative(&filename), &file.data).await?;
    Ok(Json(fragment))
}

/// GET /api/files/{project}
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let files = state.sync.list(&project).await?;
    Ok(Json(files))
}

/// DELETE /api/remove/{project}/{filename}?recursive=1
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path((project, filename)): Path<(String, String)>,
    Query(params): Query<RemoveQuery>,
) -> Result<impl IntoResponse, ServerError> {
    let recursive = params.recursive.is_some_and(|v| !v.is_empty());
    let filename = relative(&filename);

    state.sync.remove(&project, filename, recursive).await?;
    Ok(Json(json!({ "removed": filename })))
}
