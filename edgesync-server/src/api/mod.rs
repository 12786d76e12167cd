pub mod files;
pub mod sync;
pub mod versioned;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ServerError;
use crate::state::AppState;

/// Header carrying a project token on `/api/*` requests.
pub const TOKEN_HEADER: &str = "Token";

const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build the Axum router with all routes, token auth, CORS, and tracing middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/manifest/:project/:tag", get(versioned::get_manifest))
        .route("/warmup/:project", post(versioned::warm_up))
        .route("/update/:project/*filename", post(sync::update))
        .route("/update-from-git/:project", post(sync::update_from_git))
        .route("/upload/:project/*filename", post(sync::upload))
        .route("/files/:project", get(sync::list))
        .route("/list-static/:project", get(sync::list))
        .route("/remove/:project/*filename", delete(sync::remove))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .route("/upload", post(files::upload))
        .route("/download/:hash", get(files::download))
        .route("/delete/:hash", get(files::delete))
        .route("/:project/*filepath", get(versioned::get_uncached_file))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Simple health check endpoint.
async fn health_check() -> &'static str {
    "ok"
}

/// Require a `Token` header naming any configured project's token.
async fn require_token(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if state.auth_disabled || request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .map(|value| value.to_str().unwrap_or_default());

    match state.projects.authorize(token) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!(method = %request.method(), uri = %request.uri(), error = %e, "request rejected");
            ServerError::from(e).into_response()
        }
    }
}

/// A file part pulled out of a multipart body.
pub struct FormFile {
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// Read the part named `field`, skipping any others.
pub async fn form_file(mut multipart: Multipart, field: &str) -> Result<FormFile, ServerError> {
    while let Some(part) = multipart.next_field().await? {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().map(String::from);
        let data = part.bytes().await?;
        return Ok(FormFile {
            file_name,
            data: data.to_vec(),
        });
    }
    Err(ServerError::BadRequest(format!(
        "can't upload file: form field '{field}' is missing"
    )))
}

/// Wildcard captures may carry the separator; handlers want a relative name.
fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}
