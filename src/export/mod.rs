//! Self-contained HTML artifacts.
//!
//! An artifact reproduces the dual view in any browser without a server:
//! every slice and registered image is embedded as a PNG data URI next to a
//! precomputed `slice → image` lookup, and a small inline script redraws both
//! panels whenever the slider moves.
//!
//! ```text
//! VolumeHandle ─┐
//!               ├─► ArtifactPayload ─► render_artifact ─► temp file ─► rename
//! Registration ─┘        │
//!   Table                └─► fingerprint (SHA-256 of the mapping)
//! ```

mod html;
mod payload;
mod writer;

pub(crate) use html::{html_escape, PANEL_STYLES};
pub use html::{embed_payload, render_artifact, Artifact, PAYLOAD_ELEMENT_ID};
pub use payload::{ArtifactPayload, PayloadImage, PAYLOAD_VERSION};
pub use writer::{
    with_html_extension, ArtifactExporter, ExportSummary, DEFAULT_MAX_ARTIFACT_BYTES,
    DEFAULT_OUTPUT_FILE, DEFAULT_TITLE,
};
