use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use noteweave_index::{
    ChangeEvent, CreateDocumentRequest, DeleteResult, Document, FolderDeleteResult,
    FolderSummary, GraphSnapshot, IngestOutcome, MoveDocumentRequest, RestoreRequest, TrashItem,
    UpdateDocumentRequest, UpdateOutcome, apply_change,
};

use crate::error::ApiResult;
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ready: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct FolderQuery {
    pub folder: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    pub folder: Option<String>,
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct GraphQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForceQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub purged: Vec<String>,
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>, bind_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Server listening on {}", bind_addr);
    serve(state, listener).await?;
    Ok(())
}

/// Serve on an already bound listener.
pub async fn serve(state: Arc<AppState>, listener: TcpListener) -> std::io::Result<()> {
    axum::serve(listener, create_router(state)).await
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/documents", get(list_documents).post(create_document))
        .route("/documents/titles", get(list_titles))
        .route(
            "/documents/{title}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/documents/{title}/move", post(move_document))
        .route("/graph", get(get_graph))
        .route("/tags", get(get_tags))
        .route("/folders", get(list_folders).post(create_folder))
        .route("/folders/{name}", axum::routing::delete(delete_folder))
        .route("/trash", get(list_trash))
        .route("/trash/purge", post(purge_trash))
        .route("/trash/{filename}", axum::routing::delete(delete_from_trash))
        .route("/trash/{filename}/restore", post(restore_from_trash))
        .route("/events", post(ingest_event))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ready: state.engine.is_ready().await,
    })
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FolderQuery>,
) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(state.engine.list_documents(query.folder.as_deref()).await?))
}

async fn list_titles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FolderQuery>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.engine.list_titles(query.folder.as_deref()).await?))
}

async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let document = state.engine.create_document(request).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
    Query(query): Query<FolderQuery>,
) -> ApiResult<Json<Document>> {
    Ok(Json(
        state
            .engine
            .get_document(query.folder.as_deref(), &title)
            .await?,
    ))
}

async fn update_document(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
    Query(query): Query<FolderQuery>,
    Json(request): Json<UpdateDocumentRequest>,
) -> ApiResult<Json<UpdateOutcome>> {
    let outcome = state
        .engine
        .update_document(query.folder.as_deref(), &title, request)
        .await?;
    Ok(Json(outcome))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<DeleteResult>> {
    let result = state
        .engine
        .delete_document(query.folder.as_deref(), &title, query.permanent)
        .await?;
    Ok(Json(result))
}

async fn move_document(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
    Json(request): Json<MoveDocumentRequest>,
) -> ApiResult<Json<Document>> {
    let document = state
        .engine
        .move_document(request.folder.as_deref(), &title, &request.target_folder)
        .await?;
    Ok(Json(document))
}

async fn get_graph(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GraphQuery>,
) -> ApiResult<Json<GraphSnapshot>> {
    Ok(Json(state.engine.get_graph(query.refresh).await?))
}

async fn get_tags(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.engine.get_tags().await?))
}

async fn list_folders(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<FolderSummary>>> {
    Ok(Json(state.engine.list_folders().await?))
}

async fn create_folder(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateFolderRequest>,
) -> ApiResult<(StatusCode, Json<FolderSummary>)> {
    let folder = state.engine.create_folder(&request.name).await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ForceQuery>,
) -> ApiResult<Json<FolderDeleteResult>> {
    Ok(Json(state.engine.delete_folder(&name, query.force).await?))
}

async fn list_trash(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<TrashItem>>> {
    Ok(Json(state.engine.list_trash().await?))
}

async fn restore_from_trash(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    request: Option<Json<RestoreRequest>>,
) -> ApiResult<Json<Document>> {
    let folder = request.and_then(|Json(request)| request.folder);
    let document = state
        .engine
        .restore_from_trash(&filename, folder.as_deref())
        .await?;
    Ok(Json(document))
}

async fn delete_from_trash(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.delete_from_trash(&filename).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn purge_trash(State(state): State<Arc<AppState>>) -> ApiResult<Json<PurgeResponse>> {
    let purged = state.engine.purge_trash().await?;
    Ok(Json(PurgeResponse { purged }))
}

/// Change notification from an external watcher transport.
async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ChangeEvent>,
) -> ApiResult<Json<IngestOutcome>> {
    Ok(Json(apply_change(&state.engine, &event).await?))
}
