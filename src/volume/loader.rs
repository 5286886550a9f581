use std::path::{Path, PathBuf};
use std::time::Instant;

use image::DynamicImage;
use ndarray::Array3;
use tracing::{debug, info};

use crate::error::{IoError, VolumeError};
use crate::format::tiff::TiffStack;
use crate::format::{detect_source, VolumeSource};
use crate::io::FileReader;

use super::VolumeHandle;

/// Builds [`VolumeHandle`]s from files on disk.
///
/// Every slice is decoded to 8-bit intensities up front; the resulting handle
/// never touches the filesystem again.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeLoader;

impl VolumeLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load the volume at `path`.
    ///
    /// # Errors
    /// * `VolumeError::Io` - path missing or unreadable
    /// * `VolumeError::Tiff` - malformed or unsupported TIFF stack
    /// * `VolumeError::Decode` - a slice image in a directory failed to decode
    /// * `VolumeError::NotAVolume` - input is not a stack of 2D planes
    /// * `VolumeError::InconsistentDimensions` - slices differ in size
    /// * `VolumeError::TooLarge` - the decoded volume cannot be allocated
    pub fn load(&self, path: &Path) -> Result<VolumeHandle, VolumeError> {
        let started = Instant::now();
        let source = detect_source(path)?;

        let data = match &source {
            VolumeSource::TiffStack(file) => load_tiff_stack(file)?,
            VolumeSource::SliceDirectory(files) => load_slice_directory(files)?,
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let volume = VolumeHandle::from_array(data, filename)?;

        let (slices, height, width) = volume.dimensions();
        info!(
            path = %path.display(),
            source = source.name(),
            slices,
            height,
            width,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded volume"
        );

        Ok(volume)
    }
}

fn load_tiff_stack(path: &Path) -> Result<Array3<u8>, VolumeError> {
    let reader = FileReader::open(path)?;
    let stack = TiffStack::open(&reader)?;

    let first = stack.pages().first().ok_or_else(|| VolumeError::NotAVolume {
        reason: format!("{} has no pages", path.display()),
    })?;
    let expected = (first.height as usize, first.width as usize);

    let mut voxels = Vec::new();
    reserve_voxels(&mut voxels, stack.page_count(), expected)?;
    for (index, page) in stack.pages().iter().enumerate() {
        let actual = (page.height as usize, page.width as usize);
        if actual != expected {
            return Err(VolumeError::InconsistentDimensions {
                index,
                expected,
                actual,
            });
        }

        voxels.extend(stack.decode_page(&reader, index)?);
        debug!(slice = index, "Decoded TIFF page");
    }

    into_array(stack.page_count(), expected, voxels)
}

fn load_slice_directory(files: &[PathBuf]) -> Result<Array3<u8>, VolumeError> {
    let mut expected = None;
    let mut voxels = Vec::new();

    for (index, file) in files.iter().enumerate() {
        let plane = decode_slice(file)?;
        let actual = (plane.height() as usize, plane.width() as usize);

        match expected {
            None => {
                expected = Some(actual);
                reserve_voxels(&mut voxels, files.len(), actual)?;
            }
            Some(expected) if expected != actual => {
                return Err(VolumeError::InconsistentDimensions {
                    index,
                    expected,
                    actual,
                });
            }
            Some(_) => {}
        }

        voxels.extend(plane.into_raw());
        debug!(slice = index, file = %file.display(), "Decoded slice image");
    }

    let shape = expected.ok_or_else(|| VolumeError::NotAVolume {
        reason: "no slice images".to_string(),
    })?;
    into_array(files.len(), shape, voxels)
}

/// Decode one slice image to 8-bit luma.
///
/// 16-bit images keep the high byte so directories and TIFF stacks agree.
fn decode_slice(path: &Path) -> Result<image::GrayImage, VolumeError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::from_std(path, e))?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| VolumeError::Decode {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(match &decoded {
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => {
            let wide = decoded.to_luma16();
            let (width, height) = wide.dimensions();
            let narrow = wide.into_raw().into_iter().map(|v| (v >> 8) as u8).collect();
            image::GrayImage::from_raw(width, height, narrow).ok_or_else(|| {
                VolumeError::Decode {
                    path: path.display().to_string(),
                    message: "pixel buffer does not match dimensions".to_string(),
                }
            })?
        }
        other => other.to_luma8(),
    })
}

/// Reserve room for `slices` planes, failing instead of aborting when the
/// volume cannot be allocated.
fn reserve_voxels(
    voxels: &mut Vec<u8>,
    slices: usize,
    (height, width): (usize, usize),
) -> Result<(), VolumeError> {
    let too_large = || VolumeError::TooLarge {
        slices,
        height,
        width,
    };
    let total = slices
        .checked_mul(height)
        .and_then(|n| n.checked_mul(width))
        .ok_or_else(too_large)?;
    voxels.try_reserve_exact(total).map_err(|_| too_large())
}

fn into_array(
    slices: usize,
    (height, width): (usize, usize),
    voxels: Vec<u8>,
) -> Result<Array3<u8>, VolumeError> {
    Array3::from_shape_vec((slices, height, width), voxels).map_err(|e| VolumeError::NotAVolume {
        reason: e.to_string(),
    })
}
