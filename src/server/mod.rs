//! HTTP server layer for CorView.
//!
//! Hosts any number of isolated sessions, each one volume with its own
//! registration table, and serves the dual view for them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │       /sessions/{id}/{registrations,frames,slices,view}         │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │  sessions   │  │        routes           │  │
//! │  │ (requests)  │  │  (store)    │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!          Session ─► DualViewComposer ─► PngPanelEncoder ─► SliceCache
//! ```

pub mod handlers;
pub mod routes;
pub mod sessions;
pub mod viewer;

pub use handlers::{
    export_path, health_handler, AddRegistrationRequest, ApiError, AppState, ClearResponse,
    CreateSessionRequest, ErrorResponse, ExportRequest, HealthResponse, SessionInfo,
    SessionsResponse,
};
pub use routes::{create_router, create_router_with_state, RouterConfig};
pub use sessions::{SessionStore, SharedSession};
pub use viewer::generate_viewer_html;
