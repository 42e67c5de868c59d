//! HTTP front end
//!
//! Routes:
//!   POST /chat               chat turn (JSON or streamed NDJSON)
//!   POST /upload-image       multipart upload, optional OCR
//!   GET  /health             liveness and backend settings
//!   GET  /uploads/:filename  previously uploaded files
//!   GET  /                   static index page
//!   GET  /*                  any other file under the static directory

mod handlers;
mod upload;

use crate::chat::ChatService;
use crate::cli::signals::shutdown_signal;
use crate::config::DoctorConfig;
use crate::llm::{LlmClient, create_client};
use crate::ocr::{OcrEngine, TesseractOcr};
use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// State shared by all routes
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub ocr: Arc<dyn OcrEngine>,
    pub config: Arc<DoctorConfig>,
    /// Resolved once at startup
    pub ocr_available: bool,
    pub uploads_dir: Arc<PathBuf>,
    pub static_dir: Arc<PathBuf>,
}

impl AppState {
    /// Assemble state from already-built components
    pub fn new(
        config: DoctorConfig,
        base_dir: &Path,
        llm: Arc<dyn LlmClient>,
        ocr: Arc<dyn OcrEngine>,
        ocr_available: bool,
    ) -> Self {
        let paths = config.data.resolve(base_dir);
        let static_dir = base_dir.join(&config.server.static_dir);
        Self {
            chat: Arc::new(ChatService::new(&config, base_dir, llm)),
            ocr,
            config: Arc::new(config),
            ocr_available,
            uploads_dir: Arc::new(paths.uploads),
            static_dir: Arc::new(static_dir),
        }
    }

    /// Build the real Ollama and Tesseract backends from config
    pub async fn from_config(config: DoctorConfig, base_dir: &Path) -> Result<Self> {
        let llm = create_client(&config.llm).context("Failed to create LLM client")?;
        let ocr = TesseractOcr::from_config(&config.ocr);

        let ocr_available = config.ocr.enabled && ocr.is_available().await;
        if config.ocr.enabled && !ocr_available {
            tracing::warn!(
                command = %config.ocr.command,
                "OCR engine not found, uploads will be stored without analysis"
            );
        }

        Ok(Self::new(config, base_dir, llm, Arc::new(ocr), ocr_available))
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;
    let static_files = ServeDir::new(state.static_dir.as_path());
    Router::new()
        .route("/", get(handlers::index))
        .route("/chat", post(handlers::chat))
        .route("/health", get(handlers::health))
        .route("/upload-image", post(upload::upload_image))
        .route("/uploads/:filename", get(upload::serve_upload))
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until SIGINT/SIGTERM
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        addr = %addr,
        model = %state.config.llm.model,
        ollama = %state.config.llm.url,
        ocr = state.ocr_available,
        "doctor-ai listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("server stopped");
    Ok(())
}
