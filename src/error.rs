use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading bytes from a volume or image source
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File or directory does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other failure reported by the filesystem
    #[error("Read error: {0}")]
    Read(String),
}

impl IoError {
    /// Classify a `std::io::Error` for the given path.
    pub fn from_std(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(path.display().to_string()),
            _ => IoError::Read(format!("{}: {}", path.display(), err)),
        }
    }
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only uncompressed stacks are supported)")]
    UnsupportedCompression(u16),

    /// Pixel layout the stack reader cannot turn into intensities
    #[error("Unsupported sample layout: {0}")]
    UnsupportedLayout(String),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Failure to produce a [`VolumeHandle`](crate::volume::VolumeHandle).
///
/// Fatal to the load call only; the caller may retry with another path.
#[derive(Debug, Clone, Error)]
pub enum VolumeError {
    /// Could not read the file or directory
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF container could not be parsed
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// A slice image in a directory could not be decoded
    #[error("Failed to decode slice {path}: {message}")]
    Decode { path: String, message: String },

    /// Input exists but is not a stack of equally sized 2D planes
    #[error("Not a 3D volume: {reason}")]
    NotAVolume { reason: String },

    /// The decoded volume cannot be held in memory
    #[error("Volume too large: {slices} slices of {height}x{width}")]
    TooLarge {
        slices: usize,
        height: usize,
        width: usize,
    },

    /// Slices do not share the same in-plane dimensions
    #[error("Inconsistent slice dimensions: slice {index} is {actual:?}, expected {expected:?}")]
    InconsistentDimensions {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Slice lookup outside `[0, slice_count)`.
///
/// Indicates a caller bug; the slider contract never produces it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SliceError {
    #[error("Slice index {index} out of range (volume has {slice_count} slices, valid range: 0-{})", .slice_count.saturating_sub(1))]
    IndexOutOfRange { index: i64, slice_count: usize },
}

/// Errors raised by [`RegistrationTable`](crate::registration::RegistrationTable)
/// and by loading images to register.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// Position outside the bound volume; the table is left unchanged
    #[error("Invalid position {position}: volume has {slice_count} slices (valid range: 0-{})", .slice_count.saturating_sub(1))]
    InvalidPosition { position: i64, slice_count: usize },

    /// The 2D image file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The 2D image file could not be decoded
    #[error("Failed to decode image {path}: {message}")]
    Decode { path: String, message: String },
}

/// A panel could not be encoded as PNG.
#[derive(Debug, Clone, Error)]
#[error("Failed to encode {what}: {message}")]
pub struct EncodeError {
    pub what: String,
    pub message: String,
}

/// Failure to write an artifact (the `ArtifactWriteError` family).
///
/// Volume and table state are never affected.
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    /// Target path (or its directory) cannot be written
    #[error("Cannot write artifact to {path}: {message}")]
    Unwritable { path: PathBuf, message: String },

    /// Embedded payload exceeds the configured maximum artifact size
    #[error("Artifact too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// A slice or image could not be encoded for embedding
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Slice access failed while walking the volume
    #[error(transparent)]
    Slice(#[from] SliceError),
}

/// Failure to read an exported artifact back.
#[derive(Debug, Clone, Error)]
pub enum ArtifactParseError {
    /// Artifact file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// No embedded payload element in the document
    #[error("Document does not contain a CorView payload")]
    MissingPayload,

    /// Payload is present but malformed
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Errors reading a session manifest.
#[derive(Debug, Clone, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("Invalid manifest {path}: {message}")]
    Parse { path: String, message: String },
}

/// Anything that can go wrong assembling a session from paths.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

// =============================================================================
// Tests
// =============================================================================
