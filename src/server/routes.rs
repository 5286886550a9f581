//! Router configuration for the CorView server.
//!
//! # Route Structure
//!
//! ```text
//! /health                                        - Health check
//! /sessions                                      - List (GET) or open (POST) sessions
//! /sessions/{id}                                 - Session info (GET) or close (DELETE)
//! /sessions/{id}/registrations                   - List, add or clear registrations
//! /sessions/{id}/frames/{index}                  - Composed view as JSON
//! /sessions/{id}/slices/{index}.png              - Volume slice
//! /sessions/{id}/images/{entry_id}.png           - Registered image
//! /sessions/{id}/view                            - Live dual view page
//! /sessions/{id}/export                          - Write an artifact (POST)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use corview::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_export_dir("/data/exports")
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    add_registration_handler, clear_registrations_handler, create_session_handler,
    delete_session_handler, export_handler, frame_handler, get_session_handler, health_handler,
    image_png_handler, list_registrations_handler, list_sessions_handler, slice_png_handler,
    view_handler, AppState,
};
use crate::export::DEFAULT_MAX_ARTIFACT_BYTES;
use crate::registration::ResolutionPolicy;
use crate::view::{SliceCache, DEFAULT_SLICE_CACHE_CAPACITY};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Resolution policy for frames, views and exports
    pub policy: ResolutionPolicy,

    /// Directory exports are written into
    pub export_dir: PathBuf,

    /// Largest artifact an export may produce
    pub max_artifact_bytes: u64,

    /// Byte budget of the encoded slice cache
    pub slice_cache_bytes: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration with defaults.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    /// - Exports go to the working directory
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
            policy: ResolutionPolicy::default(),
            export_dir: PathBuf::from("."),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            slice_cache_bytes: DEFAULT_SLICE_CACHE_CAPACITY,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn with_max_artifact_bytes(mut self, bytes: u64) -> Self {
        self.max_artifact_bytes = bytes;
        self
    }

    pub fn with_slice_cache_bytes(mut self, bytes: usize) -> Self {
        self.slice_cache_bytes = bytes;
        self
    }

    /// Application state described by this configuration.
    pub fn app_state(&self) -> AppState {
        let mut state = AppState::new(SliceCache::with_capacity(self.slice_cache_bytes));
        state.policy = self.policy;
        state.export_dir = self.export_dir.clone();
        state.max_artifact_bytes = self.max_artifact_bytes;
        state.cache_max_age = self.cache_max_age;
        state
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router with fresh state.
pub fn create_router(config: RouterConfig) -> Router {
    let state = config.app_state();
    create_router_with_state(state, &config)
}

/// Create the router over existing state.
///
/// Lets callers keep a handle on the session store, e.g. to preload sessions.
pub fn create_router_with_state(state: AppState, config: &RouterConfig) -> Router {
    let cors = build_cors_layer(config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/sessions",
            get(list_sessions_handler).post(create_session_handler),
        )
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route(
            "/sessions/{id}/registrations",
            get(list_registrations_handler)
                .post(add_registration_handler)
                .delete(clear_registrations_handler),
        )
        .route("/sessions/{id}/frames/{index}", get(frame_handler))
        // {filename} captures "{index}.png" and "{entry_id}.png"
        .route("/sessions/{id}/slices/{filename}", get(slice_png_handler))
        .route("/sessions/{id}/images/{filename}", get(image_png_handler))
        .route("/sessions/{id}/view", get(view_handler))
        .route("/sessions/{id}/export", post(export_handler))
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
