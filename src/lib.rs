//! # CorView
//!
//! Correlative viewing of a 3D volume (e.g. a micro-CT stack) next to 2D
//! images (e.g. histology sections) registered to individual slices.
//!
//! A researcher loads a volume, registers 2D images at slice positions, and
//! either scrubs through the pair live in a browser or exports a
//! self-contained HTML document that reproduces the same dual view offline.
//!
//! ## Architecture
//!
//! - [`io`] - Byte sources for the decoders
//! - [`mod@format`] - Volume source detection and the TIFF stack reader
//! - [`volume`] - [`VolumeHandle`], the loaded 3D stack
//! - [`registration`] - [`RegistrationTable`] and slice resolution policies
//! - [`view`] - [`DualViewComposer`], panel encoding and the slice cache
//! - [`export`] - [`ArtifactExporter`] and artifact parsing
//! - [`session`] / [`manifest`] - A volume with its table, and its JSON description
//! - [`server`] - Axum-based live server
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use corview::{ArtifactExporter, RegistrationTable, VolumeHandle};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let volume = VolumeHandle::load("scans/femur.tif")?;
//!     let mut table = RegistrationTable::for_volume(&volume);
//!     table.add_from_path("histology/section_12.png", 12)?;
//!
//!     let summary = ArtifactExporter::new()
//!         .title("Femur, sample 3")
//!         .export(&volume, &table, "femur")?;
//!     println!("wrote {}", summary.path.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod io;
pub mod manifest;
pub mod registration;
pub mod server;
pub mod session;
pub mod view;
pub mod volume;

// Re-export commonly used types
pub use config::{Cli, Command, ExportConfig, InspectConfig, ListConfig, ServeConfig};
pub use error::{
    ArtifactParseError, EncodeError, ExportError, IoError, ManifestError, RegistrationError,
    SessionError, SliceError, TiffError, VolumeError,
};
pub use export::{Artifact, ArtifactExporter, ArtifactPayload, ExportSummary};
pub use format::{detect_source, VolumeSource};
pub use manifest::{Manifest, ManifestRegistration};
pub use registration::{
    EntryId, ExactMatch, Listing, NearestBelow, RegistrationEntry, RegistrationTable,
    ResolutionPolicy, SliceResolver,
};
pub use server::{create_router, AppState, RouterConfig};
pub use session::Session;
pub use view::{ComposedView, DualViewComposer, FrameDescription, ImagePanel, SliceCache};
pub use volume::{VolumeHandle, VolumeLoader};
