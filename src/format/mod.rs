//! Volume source formats.
//!
//! A volume arrives either as one multi-page TIFF or as a directory of 2D
//! slice images. [`detect::detect_source`] decides which, and [`tiff`] decodes
//! the former.

pub mod detect;
pub mod tiff;

pub use detect::{detect_source, is_tiff_header, VolumeSource, SLICE_EXTENSIONS};
