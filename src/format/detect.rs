//! Volume source detection.
//!
//! Decides how a user-supplied path should be loaded:
//!
//! - **TIFF stack**: a file starting with a TIFF/BigTIFF header; every page is
//!   one slice
//! - **Slice directory**: a directory of 2D images, one slice per file, ordered
//!   by file name
//!
//! Anything else is rejected as [`VolumeError::NotAVolume`].

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{IoError, VolumeError};

use super::tiff::{ByteOrder, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};

// =============================================================================
// VolumeSource
// =============================================================================

/// File extensions recognised as slice images inside a directory.
pub const SLICE_EXTENSIONS: &[&str] = &["png", "tif", "tiff", "jpg", "jpeg", "bmp"];

/// Where the slices of a volume come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    /// Multi-page TIFF file
    TiffStack(PathBuf),

    /// Slice images sorted by file name
    SliceDirectory(Vec<PathBuf>),
}

impl VolumeSource {
    pub const fn name(&self) -> &'static str {
        match self {
            VolumeSource::TiffStack(_) => "TIFF stack",
            VolumeSource::SliceDirectory(_) => "slice directory",
        }
    }
}

// =============================================================================
// Detection
// =============================================================================

/// Classify `path` as a TIFF stack or a slice directory.
///
/// # Errors
/// * `VolumeError::Io` - the path does not exist or cannot be read
/// * `VolumeError::NotAVolume` - a non-TIFF file, or a directory without slices
pub fn detect_source(path: &Path) -> Result<VolumeSource, VolumeError> {
    let metadata = std::fs::metadata(path).map_err(|e| IoError::from_std(path, e))?;

    if metadata.is_dir() {
        let slices = list_slice_files(path)?;
        if slices.is_empty() {
            return Err(VolumeError::NotAVolume {
                reason: format!("directory {} contains no slice images", path.display()),
            });
        }
        return Ok(VolumeSource::SliceDirectory(slices));
    }

    let mut probe = Vec::with_capacity(BIGTIFF_HEADER_SIZE);
    std::fs::File::open(path)
        .and_then(|file| file.take(BIGTIFF_HEADER_SIZE as u64).read_to_end(&mut probe))
        .map_err(|e| IoError::from_std(path, e))?;

    if is_tiff_header(&probe) {
        Ok(VolumeSource::TiffStack(path.to_path_buf()))
    } else {
        Err(VolumeError::NotAVolume {
            reason: format!("{} is not a TIFF stack or a slice directory", path.display()),
        })
    }
}

/// Slice files directly inside `dir`, sorted by file name.
fn list_slice_files(dir: &Path) -> Result<Vec<PathBuf>, VolumeError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IoError::from_std(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| IoError::from_std(dir, e))?.path();
        if path.is_file() && has_slice_extension(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn has_slice_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SLICE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Check if bytes start with a TIFF or BigTIFF header.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let byte_order = match &bytes[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };

    let version = byte_order.read_u16(&bytes[2..4]);
    version == 42 || version == 43
}

// =============================================================================
// Tests
// =============================================================================
