use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::ExportError;
use crate::registration::{RegistrationTable, ResolutionPolicy};
use crate::view::{DualViewComposer, DEFAULT_CAPTION_PREFIX};
use crate::volume::VolumeHandle;

use super::html::render_artifact;
use super::payload::ArtifactPayload;

/// Output file used when none is given.
pub const DEFAULT_OUTPUT_FILE: &str = "3DXRH-Vis.html";

/// Document title used when none is given.
pub const DEFAULT_TITLE: &str = "Correlative micro-CT and histology";

/// Default maximum artifact size: 512MB
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 512 * 1024 * 1024;

/// What an export produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub slice_count: usize,
    pub image_count: usize,
    pub policy: String,

    /// SHA-256 of the slice → image mapping, hex encoded
    pub fingerprint: String,
}

/// Writes self-contained HTML artifacts of a volume and its registrations.
///
/// # Example
///
/// ```ignore
/// let exporter = ArtifactExporter::new()
///     .title("Femur, sample 3")
///     .max_bytes(64 * 1024 * 1024);
/// let summary = exporter.export(&volume, &table, "femur")?;
/// assert!(summary.path.ends_with("femur.html"));
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactExporter {
    title: String,
    max_bytes: u64,
    policy: ResolutionPolicy,
    caption_prefix: String,
}

impl Default for ArtifactExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactExporter {
    pub fn new() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            max_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            policy: ResolutionPolicy::default(),
            caption_prefix: DEFAULT_CAPTION_PREFIX.to_string(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Largest document, in bytes, the exporter will write.
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn caption_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.caption_prefix = prefix.into();
        self
    }

    /// Render the artifact in memory without writing it.
    pub fn render(
        &self,
        volume: &VolumeHandle,
        table: &RegistrationTable,
    ) -> Result<(ArtifactPayload, String), ExportError> {
        let composer =
            DualViewComposer::with_resolver(self.policy).caption_prefix(self.caption_prefix.clone());
        let payload = ArtifactPayload::build(volume, table, &composer, &self.title)?;
        let html = render_artifact(&payload)?;

        let size = html.len() as u64;
        if size > self.max_bytes {
            return Err(ExportError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok((payload, html))
    }

    /// Write the artifact to `output` (`.html` appended when missing).
    ///
    /// The document is written to a temporary file next to the target and
    /// renamed into place, so a failed export leaves no partial file and an
    /// existing artifact is replaced whole.
    pub fn export(
        &self,
        volume: &VolumeHandle,
        table: &RegistrationTable,
        output: impl AsRef<Path>,
    ) -> Result<ExportSummary, ExportError> {
        let started = Instant::now();
        let path = with_html_extension(output.as_ref());

        let (payload, html) = self.render(volume, table).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Export failed");
            e
        })?;
        write_atomically(&path, html.as_bytes())?;

        let summary = ExportSummary {
            path,
            bytes: html.len() as u64,
            slice_count: payload.slice_count,
            image_count: payload.images.len(),
            policy: payload.policy.clone(),
            fingerprint: payload.fingerprint(),
        };

        info!(
            path = %summary.path.display(),
            bytes = summary.bytes,
            slices = summary.slice_count,
            images = summary.image_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Exported artifact"
        );
        Ok(summary)
    }
}

/// Append `.html` unless the path already ends with it.
pub fn with_html_extension(path: &Path) -> PathBuf {
    let has_html = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("html"))
        .unwrap_or(false);

    if has_html {
        path.to_path_buf()
    } else {
        let mut name = OsString::from(path.as_os_str());
        name.push(".html");
        PathBuf::from(name)
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    let unwritable = |message: String| ExportError::Unwritable {
        path: path.to_path_buf(),
        message,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(|e| unwritable(e.to_string()))?;
    file.write_all(contents)
        .and_then(|_| file.flush())
        .map_err(|e| unwritable(e.to_string()))?;
    file.persist(path).map_err(|e| unwritable(e.error.to_string()))?;
    Ok(())
}
