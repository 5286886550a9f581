use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbImage;
use tracing::{debug, info};

use crate::error::{IoError, RegistrationError};
use crate::volume::VolumeHandle;

use super::entry::{EntryId, Listing, RegistrationEntry};

/// Registered 2D images for one volume, in insertion order.
///
/// The table is bound to the slice count of its volume at creation and
/// rejects positions outside `[0, slice_count)`. Entries are only ever
/// appended or cleared all at once.
#[derive(Debug, Clone)]
pub struct RegistrationTable {
    slice_count: usize,
    entries: Vec<RegistrationEntry>,
    next_sequence: u64,
}

impl RegistrationTable {
    /// Empty table for a volume with `slice_count` slices.
    pub fn new(slice_count: usize) -> Self {
        Self {
            slice_count,
            entries: Vec::new(),
            next_sequence: 0,
        }
    }

    pub fn for_volume(volume: &VolumeHandle) -> Self {
        Self::new(volume.slice_count())
    }

    pub fn slice_count(&self) -> usize {
        self.slice_count
    }

    /// Register `image` at `position`.
    ///
    /// # Errors
    /// `RegistrationError::InvalidPosition` when `position` is outside
    /// `[0, slice_count)`. The table is unchanged in that case.
    pub fn add(
        &mut self,
        image: impl Into<Arc<RgbImage>>,
        filename: impl Into<String>,
        position: i64,
    ) -> Result<EntryId, RegistrationError> {
        let position = self.check_position(position)?;
        let id = self.next_id();
        let filename = filename.into();

        debug!(id = %id, filename = %filename, position, "Registered image");
        self.entries
            .push(RegistrationEntry::new(id, image.into(), filename, position));
        Ok(id)
    }

    /// Read and decode the image at `path`, then register it at `position`.
    ///
    /// The position is checked before the file is touched.
    pub fn add_from_path(
        &mut self,
        path: impl AsRef<Path>,
        position: i64,
    ) -> Result<EntryId, RegistrationError> {
        let path = path.as_ref();
        self.check_position(position)?;

        let image = load_rgb_image(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.add(image, filename, position)
    }

    /// Remove every entry. Returns how many were removed.
    ///
    /// Ids handed out later never collide with cleared ones.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        info!(removed, "Cleared registrations");
        removed
    }

    /// `(id, filename, position)` for every entry, in insertion order.
    pub fn list_all(&self) -> Vec<Listing> {
        self.entries.iter().map(RegistrationEntry::listing).collect()
    }

    /// The most recently added entry registered exactly at `position`.
    pub fn resolve(&self, position: i64) -> Option<&RegistrationEntry> {
        let position = usize::try_from(position).ok()?;
        self.entries.iter().rev().find(|e| e.position() == position)
    }

    pub fn get(&self, id: EntryId) -> Option<&RegistrationEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn entries(&self) -> &[RegistrationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate `position` against `[0, slice_count)` without adding anything.
    pub fn check_position(&self, position: i64) -> Result<usize, RegistrationError> {
        usize::try_from(position)
            .ok()
            .filter(|&p| p < self.slice_count)
            .ok_or(RegistrationError::InvalidPosition {
                position,
                slice_count: self.slice_count,
            })
    }

    fn next_id(&mut self) -> EntryId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let id = EntryId::new(millis, self.next_sequence);
        self.next_sequence += 1;
        id
    }
}

/// Decode an image file to 8-bit RGB.
pub fn load_rgb_image(path: &Path) -> Result<RgbImage, RegistrationError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::from_std(path, e))?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| RegistrationError::Decode {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(decoded.to_rgb8())
}
