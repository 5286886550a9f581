//! HTTP request handlers for the CorView session API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET|POST /sessions`, `GET|DELETE /sessions/{id}` - Session lifecycle
//! - `GET|POST|DELETE /sessions/{id}/registrations` - Registered images
//! - `GET /sessions/{id}/frames/{index}` - Composed view as JSON
//! - `GET /sessions/{id}/slices/{index}.png` - Volume slice
//! - `GET /sessions/{id}/images/{entry_id}.png` - Registered image
//! - `GET /sessions/{id}/view` - Live dual view page
//! - `POST /sessions/{id}/export` - Write an artifact

use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{
    EncodeError, ExportError, IoError, RegistrationError, SliceError, TiffError, VolumeError,
};
use crate::export::{ArtifactExporter, ExportSummary, DEFAULT_OUTPUT_FILE};
use crate::registration::{load_rgb_image, EntryId, Listing, ResolutionPolicy};
use crate::session::Session;
use crate::view::{
    DualViewComposer, FrameDescription, PngPanelEncoder, SliceCache, SliceCacheKey, PNG_MIME,
};
use crate::volume::VolumeHandle;

use super::sessions::{SessionStore, SharedSession};
use super::viewer::generate_viewer_html;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state, passed to handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,

    /// Encoded slice PNGs, shared by all sessions
    pub cache: Arc<SliceCache>,

    /// Policy used for frames, the live view and exports
    pub policy: ResolutionPolicy,

    /// Directory exports are written into
    pub export_dir: PathBuf,

    /// Largest artifact an export may produce
    pub max_artifact_bytes: u64,

    /// Cache-Control max-age for PNG responses, in seconds
    pub cache_max_age: u32,
}

impl AppState {
    pub fn new(cache: SliceCache) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            cache: Arc::new(cache),
            policy: ResolutionPolicy::default(),
            export_dir: PathBuf::from("."),
            max_artifact_bytes: crate::export::DEFAULT_MAX_ARTIFACT_BYTES,
            cache_max_age: 3600,
        }
    }

    fn composer(&self) -> DualViewComposer<ResolutionPolicy> {
        DualViewComposer::with_resolver(self.policy)
    }

    async fn session(&self, id: &str) -> Result<SharedSession, ApiError> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| ApiError::SessionNotFound(id.to_string()))
    }
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// TIFF stack or slice directory on the server's filesystem
    pub volume: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct AddRegistrationRequest {
    pub image: PathBuf,
    pub position: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    /// File name inside the export directory (`.html` appended when missing)
    #[serde(default)]
    pub output: Option<String>,

    #[serde(default)]
    pub title: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_position")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub volume: String,
    pub slice_count: usize,
    pub width: usize,
    pub height: usize,
    pub registrations: usize,
    pub policy: ResolutionPolicy,
}

impl SessionInfo {
    fn new(id: &str, session: &Session, policy: ResolutionPolicy) -> Self {
        let volume = session.volume();
        Self {
            id: id.to_string(),
            volume: volume.filename().to_string(),
            slice_count: volume.slice_count(),
            width: volume.width(),
            height: volume.height(),
            registrations: session.registrations().len(),
            policy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    SessionNotFound(String),
    EntryNotFound(String),
    InvalidRequest(String),
    Volume(VolumeError),
    Registration(RegistrationError),
    Slice(SliceError),
    Export(ExportError),
    Encode(EncodeError),
    Internal(String),
}

impl From<VolumeError> for ApiError {
    fn from(err: VolumeError) -> Self {
        ApiError::Volume(err)
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        ApiError::Registration(err)
    }
}

impl From<SliceError> for ApiError {
    fn from(err: SliceError) -> Self {
        ApiError::Slice(err)
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Export(err)
    }
}

impl From<EncodeError> for ApiError {
    fn from(err: EncodeError) -> Self {
        ApiError::Encode(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Background task failed: {}", err))
    }
}

fn io_status(err: &IoError) -> (StatusCode, &'static str) {
    match err {
        IoError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
    }
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Session not found: {}", id),
            ),
            ApiError::EntryNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Registration not found: {}", id),
            ),
            ApiError::InvalidRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
            }

            ApiError::Volume(err) => {
                let (status, kind) = match err {
                    VolumeError::Io(io) | VolumeError::Tiff(TiffError::Io(io)) => io_status(io),
                    VolumeError::Decode { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "decode_error")
                    }
                    VolumeError::TooLarge { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "volume_too_large")
                    }
                    VolumeError::Tiff(_)
                    | VolumeError::NotAVolume { .. }
                    | VolumeError::InconsistentDimensions { .. } => {
                        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_volume")
                    }
                };
                (status, kind, err.to_string())
            }

            ApiError::Registration(err) => {
                let (status, kind) = match err {
                    RegistrationError::InvalidPosition { .. } => {
                        (StatusCode::BAD_REQUEST, "invalid_position")
                    }
                    RegistrationError::Io(io) => io_status(io),
                    RegistrationError::Decode { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "decode_error")
                    }
                };
                (status, kind, err.to_string())
            }

            ApiError::Slice(err) => (StatusCode::BAD_REQUEST, "invalid_index", err.to_string()),

            ApiError::Export(err) => {
                let kind = match err {
                    ExportError::Unwritable { .. } => "write_error",
                    ExportError::TooLarge { .. } => "artifact_too_large",
                    ExportError::Encode(_) => "encode_error",
                    ExportError::Slice(_) => "export_error",
                };
                (StatusCode::INTERNAL_SERVER_ERROR, kind, err.to_string())
            }

            ApiError::Encode(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_error",
                err.to_string(),
            ),

            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message.clone(),
            ),
        }
    }
}

/// Convert ApiError to HTTP response.
///
/// Server errors are logged at ERROR, client errors at WARN, and 404s at
/// DEBUG (common and expected).
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.classify();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn list_sessions_handler(State(state): State<AppState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.sessions.ids().await,
    })
}

/// Load a volume and open a session over it.
pub async fn create_session_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionInfo>), ApiError> {
    let volume = tokio::task::spawn_blocking(move || VolumeHandle::load(&request.volume)).await??;

    let session = Session::new(volume);
    let mut info = SessionInfo::new("", &session, state.policy);
    info.id = state.sessions.insert(session).await;

    Ok((StatusCode::CREATED, Json(info)))
}

pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = state.session(&id).await?;
    let session = session.read().await;
    Ok(Json(SessionInfo::new(&id, &session, state.policy)))
}

pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.sessions.remove(&id).await {
        return Err(ApiError::SessionNotFound(id));
    }
    state.cache.remove_session(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_registrations_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let session = state.session(&id).await?;
    let listing = session.read().await.registrations().list_all();
    Ok(Json(listing))
}

/// Decode an image from disk and register it at a slice position.
pub async fn add_registration_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddRegistrationRequest>,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    let session = state.session(&id).await?;

    // Reject bad positions before spending time on decoding
    session
        .read()
        .await
        .registrations()
        .check_position(request.position)?;

    let path = request.image.clone();
    let image = tokio::task::spawn_blocking(move || load_rgb_image(&path)).await??;
    let filename = request
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.image.display().to_string());

    let mut session = session.write().await;
    let table = session.registrations_mut();
    let entry_id = table.add(image, filename, request.position)?;
    let listing = table
        .get(entry_id)
        .map(|entry| entry.listing())
        .ok_or_else(|| ApiError::Internal(format!("entry {} vanished", entry_id)))?;

    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn clear_registrations_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClearResponse>, ApiError> {
    let session = state.session(&id).await?;
    let removed = session.write().await.registrations_mut().clear_all();
    Ok(Json(ClearResponse { removed }))
}

/// Both panels for one slice index, without pixels.
pub async fn frame_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, i64)>,
) -> Result<Json<FrameDescription>, ApiError> {
    let session = state.session(&id).await?;
    let session = session.read().await;
    let description = session.compose(&state.composer(), index)?.describe();
    Ok(Json(description))
}

/// One volume slice as PNG.
///
/// Path: `/sessions/{id}/slices/{index}.png`
pub async fn slice_png_handler(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let index: i64 = strip_png(&filename)?
        .parse()
        .map_err(|_| ApiError::InvalidRequest(format!("Invalid slice index: {}", filename)))?;

    let session = state.session(&id).await?;
    let volume = session.read().await.volume().clone();
    let slice = volume.check_index(index)?;

    let key = SliceCacheKey::new(id.as_str(), slice);
    if let Some(png) = state.cache.get(&key).await {
        debug!(session = %id, slice, "Slice cache hit");
        return Ok(png_response(png, state.cache_max_age));
    }

    let png = tokio::task::spawn_blocking(move || -> Result<Bytes, ApiError> {
        let image = volume.slice_image(index)?;
        Ok(PngPanelEncoder::fast().encode(&image, &format!("slice {}", index))?)
    })
    .await??;

    state.cache.put(key, png.clone()).await;
    Ok(png_response(png, state.cache_max_age))
}

/// One registered image as PNG.
///
/// Path: `/sessions/{id}/images/{entry_id}.png`
pub async fn image_png_handler(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let raw_id = strip_png(&filename)?;
    let entry_id: EntryId = raw_id
        .parse()
        .map_err(|_| ApiError::InvalidRequest(format!("Invalid registration id: {}", raw_id)))?;

    let session = state.session(&id).await?;
    let image = session
        .read()
        .await
        .registrations()
        .get(entry_id)
        .map(|entry| Arc::clone(entry.image()))
        .ok_or_else(|| ApiError::EntryNotFound(raw_id.to_string()))?;

    let png = tokio::task::spawn_blocking(move || {
        PngPanelEncoder::fast().encode(&*image, "registered image")
    })
    .await??;

    Ok(png_response(png, state.cache_max_age))
}

/// Live dual view page for a session.
pub async fn view_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let session = state.session(&id).await?;
    let session = session.read().await;
    let info = SessionInfo::new(&id, &session, state.policy);
    Ok(Html(generate_viewer_html(&info)))
}

/// Write the session's artifact into the export directory.
pub async fn export_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ExportSummary>, ApiError> {
    // The body is optional; an empty one exports with defaults
    let request: ExportRequest = if body.is_empty() {
        ExportRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid export request: {}", e)))?
    };
    let output = export_path(
        &state.export_dir,
        request.output.as_deref().unwrap_or(DEFAULT_OUTPUT_FILE),
    )?;

    let session = state.session(&id).await?;
    // Snapshot so the lock is not held while encoding
    let snapshot = session.read().await.clone();

    let mut exporter = ArtifactExporter::new()
        .policy(state.policy)
        .max_bytes(state.max_artifact_bytes);
    if let Some(title) = request.title {
        exporter = exporter.title(title);
    }

    let summary = tokio::task::spawn_blocking(move || {
        exporter.export(snapshot.volume(), snapshot.registrations(), &output)
    })
    .await??;

    Ok(Json(summary))
}

// =============================================================================
// Helpers
// =============================================================================

fn strip_png(filename: &str) -> Result<&str, ApiError> {
    filename
        .strip_suffix(".png")
        .ok_or_else(|| ApiError::InvalidRequest(format!("Expected a .png path: {}", filename)))
}

fn png_response(png: Bytes, max_age: u32) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PNG_MIME.to_string()),
            (header::CACHE_CONTROL, format!("public, max-age={}", max_age)),
        ],
        png,
    )
        .into_response()
}

/// Resolve a requested export name inside `export_dir`.
///
/// Only plain relative names are accepted; `..`, roots and prefixes are
/// rejected so exports cannot escape the directory.
pub fn export_path(export_dir: &FsPath, requested: &str) -> Result<PathBuf, ApiError> {
    let relative = FsPath::new(requested);
    let plain = !requested.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if !plain {
        return Err(ApiError::InvalidRequest(format!(
            "Export output must be a relative file name: {}",
            requested
        )));
    }
    Ok(export_dir.join(relative))
}

// =============================================================================
// Tests
// =============================================================================
