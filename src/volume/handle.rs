use std::path::Path;
use std::sync::Arc;

use image::GrayImage;
use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

use crate::error::{SliceError, VolumeError};

use super::VolumeLoader;

/// A loaded volume: intensities indexed `[slice, row, col]`.
///
/// The array is shared behind an `Arc`, so cloning a handle is cheap and never
/// copies voxels. Every handle has at least one slice, row and column.
#[derive(Debug, Clone)]
pub struct VolumeHandle {
    data: Arc<Array3<u8>>,
    filename: String,
}

impl VolumeHandle {
    /// Load a volume from a TIFF stack or a directory of slice images.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VolumeError> {
        VolumeLoader::new().load(path.as_ref())
    }

    /// Wrap an in-memory array.
    ///
    /// # Errors
    /// `VolumeError::NotAVolume` if any axis is empty.
    pub fn from_array(data: Array3<u8>, filename: impl Into<String>) -> Result<Self, VolumeError> {
        let (slices, rows, cols) = data.dim();
        if slices == 0 || rows == 0 || cols == 0 {
            return Err(VolumeError::NotAVolume {
                reason: format!("empty axis in shape ({}, {}, {})", slices, rows, cols),
            });
        }

        Ok(Self {
            data: Arc::new(data),
            filename: filename.into(),
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[inline]
    pub fn slice_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// `(slice_count, height, width)`.
    pub fn dimensions(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// Validate a signed slice index against `[0, slice_count)`.
    pub fn check_index(&self, index: i64) -> Result<usize, SliceError> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.slice_count())
            .ok_or(SliceError::IndexOutOfRange {
                index,
                slice_count: self.slice_count(),
            })
    }

    /// The 2D plane at `index`, as a view into the volume.
    pub fn slice_at(&self, index: i64) -> Result<ArrayView2<'_, u8>, SliceError> {
        let index = self.check_index(index)?;
        Ok(self.data.index_axis(Axis(0), index))
    }

    /// The plane at `index` as a greyscale image for rendering.
    pub fn slice_image(&self, index: i64) -> Result<GrayImage, SliceError> {
        let plane = self.slice_at(index)?;
        let pixels: Vec<u8> = plane.iter().copied().collect();

        // Buffer length always equals width * height
        GrayImage::from_raw(self.width() as u32, self.height() as u32, pixels).ok_or(
            SliceError::IndexOutOfRange {
                index,
                slice_count: self.slice_count(),
            },
        )
    }
}
