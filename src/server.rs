//! HTTP upload/download service.

use crate::config::ServerConfig;
use crate::error::{ApiError, PipelineError, ValidationError};
use crate::matcher::SearchQuery;
use crate::pipeline::{Highlighter, ImageJob, ProcessedImage};
use crate::storage::{remove_quietly, sanitize_filename, schedule_delayed_delete, RequestFiles};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use image::ImageFormat;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub highlighter: Highlighter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(highlighter: Highlighter, config: ServerConfig) -> Self {
        Self {
            highlighter,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/process-images", post(process_images))
        .route("/download/:filename", get(download_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub message: String,
    pub processed_image_url: String,
    pub file_name: String,
    pub total_processed: usize,
}

/// An uploaded image held in memory until the query has been validated.
struct Upload {
    filename: String,
    data: Bytes,
}

/// Search every uploaded image and return a link to the first highlighted one.
async fn process_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut user_input = String::new();
    let mut saw_images = false;
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user_input") => {
                user_input = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Multipart(e.to_string()))?;
            }
            Some("images") => {
                saw_images = true;
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Multipart(e.to_string()))?;
                if !filename.is_empty() {
                    uploads.push(Upload { filename, data });
                }
            }
            _ => {}
        }
    }

    // Nothing touches the disk until the request is known to be valid
    let query = SearchQuery::new(&user_input)?;
    if !saw_images {
        return Err(ValidationError::NoImages.into());
    }
    if uploads.is_empty() {
        return Err(ValidationError::NoNamedImages.into());
    }

    info!("Received {} image(s), searching for \"{}\"", uploads.len(), query);

    let highlighter = state.highlighter.clone();
    let config = state.config.clone();
    let batch_query = query.clone();
    let processed = tokio::task::spawn_blocking(move || {
        run_batch(&highlighter, &config, &uploads, &batch_query)
    })
    .await
    .map_err(|e| {
        error!("Processing task failed: {}", e);
        ApiError::Internal(e.to_string())
    })?
    .map_err(|e| {
        error!("Error in processing: {}", e);
        ApiError::Internal(e.to_string())
    })?;

    let total_processed = processed.len();
    let mut processed = processed.into_iter();
    let Some(first) = processed.next() else {
        return Err(ApiError::NoMatches {
            query: query.to_string(),
        });
    };

    // Only the first result is ever handed out
    for extra in processed {
        remove_quietly(&extra.path);
    }
    schedule_delayed_delete(first.path.clone(), state.config.unclaimed_ttl);

    let processed_image_url = format!(
        "{}/download/{}",
        base_url(&state.config, &headers),
        first.filename
    );
    info!("Returning {} ({} image(s) matched)", first.filename, total_processed);

    Ok(Json(ProcessResponse {
        message: format!(
            "Successfully found and highlighted \"{}\" in {} image(s)!",
            query, total_processed
        ),
        processed_image_url,
        file_name: first.filename,
        total_processed,
    }))
}

/// Save uploads, run the batch, then delete the saved uploads whatever the outcome.
fn run_batch(
    highlighter: &Highlighter,
    config: &ServerConfig,
    uploads: &[Upload],
    query: &SearchQuery,
) -> Result<Vec<ProcessedImage>, PipelineError> {
    let files = RequestFiles::new();
    debug!("Request {}: saving {} upload(s)", files.request_id(), uploads.len());
    let mut input_paths = Vec::with_capacity(uploads.len());

    let result = save_uploads(config, &files, uploads, &mut input_paths)
        .map(|jobs| highlighter.process_batch(&jobs, query));

    for path in &input_paths {
        remove_quietly(path);
    }
    result
}

fn save_uploads(
    config: &ServerConfig,
    files: &RequestFiles,
    uploads: &[Upload],
    input_paths: &mut Vec<PathBuf>,
) -> Result<Vec<ImageJob>, PipelineError> {
    std::fs::create_dir_all(&config.upload_dir)
        .map_err(|e| PipelineError::io(&config.upload_dir, e))?;

    let mut jobs = Vec::with_capacity(uploads.len());
    for (idx, upload) in uploads.iter().enumerate() {
        let input_path = config.upload_dir.join(files.input_name(idx, &upload.filename));
        std::fs::write(&input_path, &upload.data).map_err(|e| PipelineError::io(&input_path, e))?;
        input_paths.push(input_path.clone());

        let output_filename = files.output_name(idx, &upload.filename);
        jobs.push(ImageJob {
            input_path,
            output_path: config.output_dir.join(&output_filename),
            output_filename,
        });
    }
    Ok(jobs)
}

fn base_url(config: &ServerConfig, headers: &HeaderMap) -> String {
    if let Some(url) = &config.public_url {
        return url.clone();
    }
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{}", host))
        .unwrap_or_default()
}

/// Send a processed image as an attachment, then delete it.
async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let safe_name = sanitize_filename(&filename);
    if safe_name.is_empty() {
        return Err(ApiError::NotFound);
    }
    let path = state.config.output_dir.join(&safe_name);

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(ApiError::NotFound),
        Err(e) => {
            error!("Error downloading file {:?}: {}", path, e);
            return Err(ApiError::DownloadFailed);
        }
    };

    if remove_quietly(&path) {
        info!("Deleted processed file: {}", safe_name);
    }
    schedule_delayed_delete(path.clone(), state.config.delete_delay);

    let content_type = ImageFormat::from_path(&path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", safe_name),
            ),
        ],
        data,
    )
        .into_response())
}
