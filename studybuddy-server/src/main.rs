mod config;
mod dto;
mod feed;
mod handlers;
mod models;
mod repository;
mod service;
mod storage;

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, delete, get, patch, post, put},
};

use std::sync::Arc;

use handlers::{ai, rest};
use repository::Repository;

use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use feed::{NoteFeed, PresenceFeed};
use service::{
    AiProxyService, FileService, NoteService, PresenceService, ProfileService, ProgressService,
};
use storage::BlobStore;

#[derive(Clone)]
pub struct AppState {
    pub notes: Arc<NoteService>,
    pub progress: Arc<ProgressService>,
    pub profiles: Arc<ProfileService>,
    pub presence: Arc<PresenceService>,
    pub files: Arc<FileService>,
    pub ai: Arc<AiProxyService>,
}

#[tokio::main]
async fn main() {
    // Log setup
    tracing_subscriber::fmt::init();

    // Load config
    let cfg = config::load_config().expect("failed to locate or load config file");
    tracing::info!("Successfully loaded server config");

    // Repository creation and migration
    let repo = Repository::new(cfg.database_dsn.clone())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to establish database connection: {e}");
            panic!("failed to establish database connection: {e}");
        });
    let repo_ptr = Arc::new(tokio::sync::Mutex::new(repo));

    repo_ptr.lock().await.migrate().await.unwrap_or_else(|e| {
        tracing::error!("Failed to migrate database: {e}");
        panic!("failed to migrate database: {e}");
    });

    // Service creation
    let note_feed = NoteFeed::new(256);
    let presence_feed = PresenceFeed::new(256);
    let blob_store = BlobStore::new(cfg.storage_root.clone(), cfg.signing_secret.clone());

    let state = AppState {
        notes: Arc::new(NoteService::new(repo_ptr.clone(), note_feed)),
        progress: Arc::new(ProgressService::new(repo_ptr.clone())),
        profiles: Arc::new(ProfileService::new(repo_ptr.clone())),
        presence: Arc::new(PresenceService::new(repo_ptr.clone(), presence_feed)),
        files: Arc::new(FileService::new(
            repo_ptr.clone(),
            blob_store,
            cfg.download_url_ttl,
        )),
        ai: Arc::new(AiProxyService::new(cfg.ai.clone())),
    };

    // REST router config
    let rest_router = Router::new()
        .route("/notes", post(rest::create_note))
        .route("/notes", get(rest::get_all_notes))
        .route("/notes/search", get(rest::search_notes))
        .route("/notes/feed", get(rest::note_feed))
        .route("/notes/{id}", put(rest::update_note))
        .route("/notes/{id}", delete(rest::delete_note))
        .route("/notes/{id}/versions", get(rest::get_note_versions))
        .route("/categories", get(rest::get_categories))
        .route("/shares", post(rest::create_share))
        .route("/shares", get(rest::get_shared_notes))
        .route("/progress", get(rest::get_progress))
        .route("/progress/minutes", post(rest::add_study_minutes))
        .route("/progress/notes-created", post(rest::count_note_created))
        .route("/progress/quizzes-done", post(rest::count_quiz_done))
        .route("/profile", get(rest::get_profile))
        .route("/profile/{id}", patch(rest::update_profile))
        .route("/presence", post(rest::update_presence))
        .route("/presence", get(rest::get_presence))
        .route("/presence", delete(rest::leave_presence))
        .route("/presence/feed", get(rest::presence_feed))
        .route("/files", post(rest::upload_file))
        .route("/files", get(rest::get_all_files))
        .route("/files/{id}/download-url", get(rest::get_download_url))
        .route("/files/download/{*path}", get(rest::download_file))
        .route("/files/{id}", delete(rest::delete_file))
        .merge(
            SwaggerUi::new("/swagger-ui")
                .config(utoipa_swagger_ui::Config::new([
                    "/rest/api-doc/openapi.json",
                ]))
                .url("/api-doc/openapi.json", rest::ApiDoc::openapi()),
        )
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    // AI proxy router config
    let functions_router = Router::new()
        .route("/chat", post(ai::chat))
        .route("/improve-note", post(ai::improve_note))
        .route("/generate-quiz", post(ai::generate_quiz))
        .route("/generate-exam", post(ai::generate_exam))
        .route("/generate-flashcards", post(ai::generate_flashcards))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let router = Router::new()
        .route("/", any(root))
        .nest("/rest", rest_router)
        .nest("/functions", functions_router);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", cfg.port))
        .await
        .expect("Failed to bind to address");
    let addr = listener.local_addr().unwrap();

    tracing::info!("StudyBuddy server starting, listening on {}", addr);

    axum::serve(listener, router)
        .await
        .expect("Failed to start server");
}

async fn root() -> Response {
    (StatusCode::OK, "Hello from StudyBuddy!").into_response()
}
