//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/projects` | Create a project |
//! | `GET`  | `/projects` | List projects with chunk counts |
//! | `GET`  | `/projects/{id}` | Show one project |
//! | `DELETE` | `/projects/{id}` | Delete a project and its chunks |
//! | `POST` | `/projects/{id}/ingest-folder` | Walk and ingest a local folder |
//! | `POST` | `/projects/{id}/ingest-repo` | Clone/pull and ingest a git repository |
//! | `POST` | `/projects/{id}/upsert-files` | Multipart upload of individual files |
//! | `POST` | `/projects/{id}/reembed` | Re-ingest the recorded root path |
//! | `GET`  | `/projects/{id}/files` | Files with chunk counts (`?pattern=`) |
//! | `GET`  | `/projects/{id}/documents` | Documents with chunk counts |
//! | `GET`  | `/projects/{id}/chunks` | Stored chunks (`?rel_path=&limit=`) |
//! | `POST` | `/ask` | Retrieval-augmented answer |
//! | `GET`  | `/search` | Retrieval-only previews (`?q=&project_id=`) |
//! | `POST` | `/maintenance/sweep` | Delete chunks of unregistered projects |
//! | `GET`  | `/health` | Health check |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "project not found: proj_1234abcd" } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `embedding_failed` (502),
//! `completion_failed` (502), `store_unavailable` (503), `internal` (500).

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use codebase_assistant_core::models::{DocumentSummary, FileSummary, Project, StoredChunk};

use crate::context::AppContext;
use crate::error::AssistantError;
use crate::ingest::{IngestResult, ReembedResult, UpsertFilesResult};
use crate::projects::{self, DeleteResult, ProjectSummary, SweepResult};
use crate::registry::NewProject;
use crate::retrieval::{self, AskRequest, AskResponse, SearchResponse};

type AppState = Arc<AppContext>;

/// Wraps [`AssistantError`] so handlers can return it as an HTTP response.
struct AppError(AssistantError);

impl From<AssistantError> for AppError {
    fn from(e: AssistantError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AssistantError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AssistantError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            AssistantError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AssistantError::Embedding(_) | AssistantError::Completion(_) => StatusCode::BAD_GATEWAY,
            AssistantError::Io(_) | AssistantError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
        }
        (status, Json(self.0.payload())).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

/// Build the router over a shared context.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/projects", post(handle_create_project).get(handle_list_projects))
        .route(
            "/projects/{id}",
            get(handle_get_project).delete(handle_delete_project),
        )
        .route("/projects/{id}/ingest-folder", post(handle_ingest_folder))
        .route("/projects/{id}/ingest-repo", post(handle_ingest_repo))
        .route("/projects/{id}/upsert-files", post(handle_upsert_files))
        .route("/projects/{id}/reembed", post(handle_reembed))
        .route("/projects/{id}/files", get(handle_list_files))
        .route("/projects/{id}/documents", get(handle_list_documents))
        .route("/projects/{id}/chunks", get(handle_list_chunks))
        .route("/ask", post(handle_ask))
        .route("/search", get(handle_search))
        .route("/maintenance/sweep", post(handle_sweep))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(ctx)
}

/// Bind `[server].bind` and serve until the process is terminated.
pub async fn run_server(ctx: AppContext) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let app = build_router(Arc::new(ctx));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "server listening");
    println!("Codebase Assistant API listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Projects ============

async fn handle_create_project(
    State(ctx): State<AppState>,
    Json(req): Json<NewProject>,
) -> ApiResult<Project> {
    Ok(Json(projects::create_project(&ctx, req).await?))
}

async fn handle_list_projects(State(ctx): State<AppState>) -> ApiResult<Vec<ProjectSummary>> {
    Ok(Json(projects::list_projects(&ctx).await?))
}

async fn handle_get_project(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ProjectSummary> {
    Ok(Json(projects::show_project(&ctx, &id).await?))
}

async fn handle_delete_project(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResult> {
    Ok(Json(projects::delete_project(&ctx, &id).await?))
}

// ============ Ingestion ============

#[derive(Deserialize)]
struct IngestFolderRequest {
    folder_path: String,
    #[serde(default)]
    extensions: Option<Vec<String>>,
}

async fn handle_ingest_folder(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<IngestFolderRequest>,
) -> ApiResult<IngestResult> {
    let folder = PathBuf::from(&req.folder_path);
    Ok(Json(
        projects::ingest_folder(&ctx, &id, &folder, req.extensions.as_deref()).await?,
    ))
}

#[derive(Deserialize)]
struct IngestRepoRequest {
    repo_url: String,
    #[serde(default)]
    branch: Option<String>,
    dest_dir: String,
}

async fn handle_ingest_repo(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<IngestRepoRequest>,
) -> ApiResult<IngestResult> {
    let dest = PathBuf::from(&req.dest_dir);
    Ok(Json(
        projects::ingest_repo(&ctx, &id, &req.repo_url, req.branch.as_deref(), &dest).await?,
    ))
}

async fn handle_upsert_files(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<UpsertFilesResult> {
    let bad_multipart = |e: axum::extract::multipart::MultipartError| {
        AssistantError::InvalidInput(format!("invalid multipart body: {}", e))
    };

    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(bad_multipart)?;
        uploads.push((name, bytes.to_vec()));
    }
    if uploads.is_empty() {
        return Err(AssistantError::InvalidInput("no files in upload".to_string()).into());
    }

    Ok(Json(projects::upload_files(&ctx, &id, uploads).await?))
}

#[derive(Deserialize)]
struct ReembedRequest {
    #[serde(default = "default_strategy")]
    strategy: String,
}

fn default_strategy() -> String {
    "replace".to_string()
}

async fn handle_reembed(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReembedRequest>,
) -> ApiResult<ReembedResult> {
    Ok(Json(projects::reembed(&ctx, &id, &req.strategy).await?))
}

// ============ Browsing ============

#[derive(Deserialize)]
struct FilesQuery {
    pattern: Option<String>,
}

async fn handle_list_files(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<FilesQuery>,
) -> ApiResult<Vec<FileSummary>> {
    ctx.registry.require(&id).await?;
    Ok(Json(ctx.store.list_files(&id, q.pattern.as_deref()).await?))
}

async fn handle_list_documents(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<DocumentSummary>> {
    ctx.registry.require(&id).await?;
    Ok(Json(ctx.store.list_documents(&id).await?))
}

#[derive(Deserialize)]
struct ChunksQuery {
    rel_path: Option<String>,
    #[serde(default = "default_chunk_limit")]
    limit: usize,
}

fn default_chunk_limit() -> usize {
    200
}

async fn handle_list_chunks(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ChunksQuery>,
) -> ApiResult<Vec<StoredChunk>> {
    ctx.registry.require(&id).await?;
    Ok(Json(
        ctx.store
            .get_chunks(&id, q.rel_path.as_deref(), q.limit)
            .await?,
    ))
}

// ============ Ask / Search ============

async fn handle_ask(
    State(ctx): State<AppState>,
    Json(req): Json<AskRequest>,
) -> ApiResult<AskResponse> {
    let top_k = req.top_k.unwrap_or(ctx.config.retrieval.top_k);
    Ok(Json(
        retrieval::ask(&ctx, &req.question, req.project_id.as_deref(), top_k).await?,
    ))
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    project_id: Option<String>,
}

async fn handle_search(
    State(ctx): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    Ok(Json(
        retrieval::search(&ctx, &q.q, q.project_id.as_deref()).await?,
    ))
}

// ============ Maintenance ============

async fn handle_sweep(State(ctx): State<AppState>) -> ApiResult<SweepResult> {
    Ok(Json(projects::sweep_orphans(&ctx).await?))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use codebase_assistant_core::completion::{CompletionParams, CompletionProvider};
    use codebase_assistant_core::embedding::EmbeddingProvider;
    use codebase_assistant_core::store::memory::InMemoryVectorDb;

    use crate::config::Config;

    struct OnesEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for OnesEmbedder {
        fn model_name(&self) -> &str {
            "ones"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct EchoCompletion;

    #[async_trait::async_trait]
    impl CompletionProvider for EchoCompletion {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, _prompt: &str, _params: CompletionParams) -> anyhow::Result<String> {
            Ok("It prints hello.".to_string())
        }
    }

    fn app(dir: &std::path::Path) -> Router {
        let config = Config::minimal().rooted_at(dir);
        let ctx = AppContext::new(
            config,
            Arc::new(InMemoryVectorDb::new()),
            Arc::new(OnesEmbedder),
            Arc::new(EchoCompletion),
        );
        build_router(Arc::new(ctx))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = send(&app(dir.path()), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn create_requires_source() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = send(
            &app(dir.path()),
            post_json("/projects", serde_json::json!({"project_name": "demo"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn unknown_project_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = send(&app(dir.path()), get_req("/projects/proj_missing/files")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn ingest_browse_ask_delete_flow() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.py"), "print('hello')\n").unwrap();
        let app = app(dir.path());

        let (status, project) = send(
            &app,
            post_json(
                "/projects",
                serde_json::json!({"project_name": "demo", "root_path": src.to_string_lossy()}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = project["project_id"].as_str().unwrap().to_string();

        let (status, ingest) = send(
            &app,
            post_json(
                &format!("/projects/{}/ingest-folder", id),
                serde_json::json!({"folder_path": src.to_string_lossy()}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ingest["files_ingested"], 1);
        assert_eq!(ingest["chunks_upserted"], 1);

        let (_, files) = send(&app, get_req(&format!("/projects/{}/files", id))).await;
        assert_eq!(files[0]["rel_path"], "a.py");
        assert_eq!(files[0]["chunks"], 1);

        let (_, search) = send(&app, get_req(&format!("/search?q=hello&project_id={}", id))).await;
        assert_eq!(search["count"], 1);
        assert_eq!(search["results"][0]["rel_path"], "a.py");

        let (status, answer) = send(
            &app,
            post_json("/ask", serde_json::json!({"question": "what prints?", "project_id": id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer["answer"], "It prints hello.");
        assert_eq!(answer["matches"].as_array().unwrap().len(), 1);

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/projects/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, deleted) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deleted_chunks"], 1);

        let (status, _) = send(&app, get_req(&format!("/projects/{}", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reembed_rejects_unknown_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let (_, project) = send(
            &app,
            post_json(
                "/projects",
                serde_json::json!({"project_name": "demo", "repo_url": "https://example.com/r.git"}),
            ),
        )
        .await;
        let id = project["project_id"].as_str().unwrap();

        let (status, json) = send(
            &app,
            post_json(
                &format!("/projects/{}/reembed", id),
                serde_json::json!({"strategy": "merge"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "bad_request");

        let (status, json) = send(
            &app,
            post_json(&format!("/projects/{}/reembed", id), serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["message"].as_str().unwrap().contains("No root_path"));
    }

    #[tokio::test]
    async fn upsert_files_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let (_, project) = send(
            &app,
            post_json(
                "/projects",
                serde_json::json!({"project_name": "demo", "root_path": "/tmp"}),
            ),
        )
        .await;
        let id = project["project_id"].as_str().unwrap();

        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"up.py\"\r\n\
             Content-Type: text/x-python\r\n\r\nx = 1\r\n--{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method("POST")
            .uri(format!("/projects/{}/upsert-files", id))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, json) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["files_upserted"], 1);
        assert!(dir.path().join("data/uploads/up.py").exists());
    }
}
