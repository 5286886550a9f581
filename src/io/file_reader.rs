use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use crate::error::IoError;

use super::RangeReader;

/// Range reader over a file loaded from local disk.
///
/// Volume stacks are decoded in full anyway, so the file is read once and
/// every range request is served from memory.
#[derive(Clone)]
pub struct FileReader {
    inner: MemoryReader,
}

impl FileReader {
    /// Read the whole file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| IoError::from_std(path, e))?;
        debug!(path = %path.display(), bytes = data.len(), "Read volume file");

        let identifier = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            inner: MemoryReader::new(data, identifier),
        })
    }
}

impl RangeReader for FileReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.inner.read_exact_at(offset, len)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}

/// Range reader over an in-memory buffer.
#[derive(Clone)]
pub struct MemoryReader {
    data: Bytes,
    identifier: String,
}

impl MemoryReader {
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }
}

impl RangeReader for MemoryReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let out_of_bounds = || IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size: self.data.len() as u64,
        };

        let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.data.len() {
            return Err(out_of_bounds());
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
