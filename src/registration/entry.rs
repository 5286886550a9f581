use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// EntryId
// =============================================================================

/// Identifier of a registration, rendered as `<unix-millis>-<sequence>`.
///
/// The timestamp records when the entry was added; the sequence is unique
/// within its table, so two entries added in the same millisecond still get
/// distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId {
    millis: u64,
    sequence: u64,
}

impl EntryId {
    pub const fn new(millis: u64, sequence: u64) -> Self {
        Self { millis, sequence }
    }

    pub const fn millis(&self) -> u64 {
        self.millis
    }

    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.sequence)
    }
}

/// Error for strings that are not `<millis>-<sequence>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid entry id: {0}")]
pub struct ParseEntryIdError(pub String);

impl FromStr for EntryId {
    type Err = ParseEntryIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseEntryIdError(s.to_string());
        let (millis, sequence) = s.split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            millis: millis.parse().map_err(|_| invalid())?,
            sequence: sequence.parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// RegistrationEntry
// =============================================================================

/// A 2D image pinned to one slice position. Immutable once created.
#[derive(Debug, Clone)]
pub struct RegistrationEntry {
    id: EntryId,
    image: Arc<RgbImage>,
    filename: String,
    position: usize,
}

impl RegistrationEntry {
    pub(crate) fn new(id: EntryId, image: Arc<RgbImage>, filename: String, position: usize) -> Self {
        Self {
            id,
            image,
            filename,
            position,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn image(&self) -> &Arc<RgbImage> {
        &self.image
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// The `(id, filename, position)` row used for listings.
    pub fn listing(&self) -> Listing {
        Listing {
            id: self.id,
            filename: self.filename.clone(),
            position: self.position,
        }
    }
}

/// One row of [`RegistrationTable::list_all`](super::RegistrationTable::list_all).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: EntryId,
    pub filename: String,
    pub position: usize,
}
