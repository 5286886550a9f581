//! Session manifests.
//!
//! A manifest describes a volume and the images to register against it:
//!
//! ```json
//! {
//!   "volume": "scans/femur.tif",
//!   "title": "Femur, sample 3",
//!   "registrations": [
//!     { "image": "histology/section_12.png", "position": 12 }
//!   ]
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the manifest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IoError, ManifestError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub volume: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub registrations: Vec<ManifestRegistration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRegistration {
    pub image: PathBuf,
    pub position: i64,
}

impl Manifest {
    /// Read a manifest file and resolve its paths.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| IoError::from_std(path, e))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));

        let manifest = Self::parse(&text, base).map_err(|message| ManifestError::Parse {
            path: path.display().to_string(),
            message,
        })?;
        debug!(
            path = %path.display(),
            registrations = manifest.registrations.len(),
            "Read manifest"
        );
        Ok(manifest)
    }

    /// Parse manifest JSON, resolving relative paths against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self, String> {
        let mut manifest: Manifest = serde_json::from_str(text).map_err(|e| e.to_string())?;

        manifest.volume = resolve_path(base, &manifest.volume);
        for registration in &mut manifest.registrations {
            registration.image = resolve_path(base, &registration.image);
        }
        Ok(manifest)
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
