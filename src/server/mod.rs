use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::pipeline::{ConversionPipeline, Converter};
use crate::ConvertError;

/// Response header carrying the served filename, exposed through CORS so
/// browser clients can read it
pub const DOWNLOAD_FILENAME_HEADER: &str = "x-download-filename";

#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<dyn Converter>,
    pub default_quality: String,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub url: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Run the HTTP service until the process is stopped
pub async fn serve(config: Config) -> crate::Result<()> {
    fs_err::create_dir_all(&config.storage.download_dir)?;

    let state = AppState {
        converter: Arc::new(ConversionPipeline::new(&config)),
        default_quality: config.conversion.default_quality.clone(),
    };

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            CONTENT_DISPOSITION,
            HeaderName::from_static(DOWNLOAD_FILENAME_HEADER),
        ]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/convert", post(convert_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[tracing::instrument(skip(state, payload))]
async fn convert_handler(
    State(state): State<AppState>,
    Json(payload): Json<ConvertRequest>,
) -> Response {
    let url = match payload.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            tracing::warn!("convert request without url");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "URL é obrigatória".to_string(),
                }),
            )
                .into_response();
        }
    };

    let quality = payload
        .quality
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(&state.default_quality)
        .to_string();

    let artifact = match state.converter.process_url(&url, &quality).await {
        Ok(artifact) => artifact,
        Err(ConvertError::InvalidQuality(value)) => {
            tracing::warn!(quality = %value, "convert request with invalid quality");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "Qualidade inválida. Use algo como 128k, 192k ou 320k".to_string(),
                }),
            )
                .into_response();
        }
        Err(error) => {
            tracing::error!(url = %url, error = %error, "conversion failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Erro ao processar o vídeo".to_string(),
                }),
            )
                .into_response();
        }
    };

    match artifact_response(&artifact.path, &artifact.display_name).await {
        Ok(response) => response,
        Err(error) => {
            tracing::error!(
                path = %artifact.path.display(),
                error = %error,
                "failed to serve finished artifact"
            );
            // The stream never started, so the handler still owns deletion.
            if let Err(e) = std::fs::remove_file(&artifact.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %artifact.path.display(), error = %e, "failed to delete artifact");
                }
            }
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Erro ao processar o vídeo".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Stream the MP3 back as an attachment; the file is deleted once the
/// response stream is dropped (fully sent or client gone)
async fn artifact_response(path: &PathBuf, display_name: &str) -> crate::Result<Response> {
    let metadata = tokio::fs::metadata(path).await?;
    let file = tokio::fs::File::open(path).await?;
    let stream = ArtifactStream::new(file, path.clone());

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    headers.insert(
        CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())?,
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{display_name}\""))?,
    );
    headers.insert(
        HeaderName::from_static(DOWNLOAD_FILENAME_HEADER),
        HeaderValue::from_str(display_name)?,
    );

    Ok((headers, Body::from_stream(stream)).into_response())
}

/// File stream that deletes the backing file when dropped.
///
/// Axum drops the body only after the last byte has been handed to the
/// client (or the connection died), which makes drop the post-response hook
/// for removing the served artifact.
struct ArtifactStream {
    inner: ReaderStream<tokio::fs::File>,
    path: PathBuf,
}

impl ArtifactStream {
    fn new(file: tokio::fs::File, path: PathBuf) -> Self {
        Self {
            inner: ReaderStream::new(file),
            path,
        }
    }
}

impl Stream for ArtifactStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for ArtifactStream {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "served artifact deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to delete served artifact")
            }
        }
    }
}
