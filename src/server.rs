use crate::{
    config::Config,
    errors::{AppError, AppResult},
    tree::FileTree,
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub tree: Arc<FileTree>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub path: String,
}

pub async fn serve(cfg: Config, tree: FileTree) -> anyhow::Result<()> {
    let shared = AppState { cfg: Arc::new(cfg), tree: Arc::new(tree) };

    let app = build_router(shared.clone());

    let addr: std::net::SocketAddr =
        format!("{}:{}", shared.cfg.server.bind_addr, shared.cfg.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(shared: AppState) -> Router {
    let base = shared.cfg.server.base_path.trim_end_matches('/').to_string();
    Router::new()
        .route("/healthz", get(health))
        .route(&format!("{base}/tree"), get(tree))
        .route(&format!("{base}/list"), get(list))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn tree(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    let started = Instant::now();
    let path = match requested_path(query) {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    let result = state.tree.list_tree_async(path.clone()).await;
    let nodes = result.as_ref().map(|n| n.iter().map(|c| c.count()).sum::<usize>()).unwrap_or(0);
    audit("tree", &path, &result, started, nodes);
    match result {
        Ok(children) => (StatusCode::OK, Json(children)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    let started = Instant::now();
    let path = match requested_path(query) {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    let result = state.tree.list_paths_async(path.clone()).await;
    let nodes = result.as_ref().map(Vec::len).unwrap_or(0);
    audit("list", &path, &result, started, nodes);
    match result {
        Ok(paths) => (StatusCode::OK, Json(paths)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn requested_path(query: Result<Query<ListQuery>, QueryRejection>) -> AppResult<String> {
    query
        .map(|Query(q)| q.path)
        .map_err(|r| AppError::BadRequest(r.body_text()))
}

fn audit<T>(route: &str, path: &str, result: &AppResult<T>, started: Instant, nodes: usize) {
    let (decision, code) = match result {
        Ok(_) => ("allow", "OK"),
        Err(AppError::Forbidden(_)) => ("deny", "Forbidden"),
        Err(e) => ("error", e.code()),
    };
    tracing::info!(
        request_id = %uuid::Uuid::new_v4(),
        route = route,
        path = path,
        decision = decision,
        code = code,
        duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        nodes = nodes,
        "audit"
    );
}
