use bytes::Bytes;

use crate::error::IoError;

/// Random access to the bytes of a volume container.
///
/// The TIFF stack reader only asks for the header, IFDs, tag arrays and
/// strips, so it never needs a seekable handle of its own.
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Fails with [`IoError::RangeOutOfBounds`] when the range runs past the end.
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Name used in log lines, usually the file name.
    fn identifier(&self) -> &str;

    /// Read up to `max_len` bytes from the start of the resource.
    ///
    /// Shorter resources are returned whole, which lets header parsers report
    /// a precise "file too small" error instead of an out-of-bounds read.
    fn read_prefix(&self, max_len: usize) -> Result<Bytes, IoError> {
        let len = (max_len as u64).min(self.size()) as usize;
        self.read_exact_at(0, len)
    }
}
