//! Data embedded in an exported artifact.
//!
//! The payload holds every slice and every registered image as PNG data URIs,
//! plus a precomputed `slice → image` lookup. The artifact's script only
//! indexes into this table, so the document reproduces whichever resolution
//! policy was used at export time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ExportError;
use crate::registration::{EntryId, RegistrationTable, SliceResolver};
use crate::view::{DualViewComposer, PngPanelEncoder, PLACEHOLDER_TEXT};
use crate::volume::VolumeHandle;

/// Payload format version.
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPayload {
    pub version: u32,
    pub title: String,

    /// File name of the source volume
    pub volume: String,

    /// Resolution policy the lookup was computed with
    pub policy: String,

    pub placeholder: String,
    pub slice_count: usize,
    pub width: usize,
    pub height: usize,

    /// One PNG data URI per slice
    pub slices: Vec<String>,

    /// Every registered image, in insertion order
    pub images: Vec<PayloadImage>,

    /// For each slice, the index into `images` to display
    pub lookup: Vec<Option<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadImage {
    pub id: EntryId,
    pub filename: String,
    pub position: usize,
    pub caption: String,
    pub src: String,
}

impl ArtifactPayload {
    /// Encode `volume` and `table` and precompute the lookup with `composer`'s
    /// resolver.
    pub fn build<R: SliceResolver>(
        volume: &VolumeHandle,
        table: &RegistrationTable,
        composer: &DualViewComposer<R>,
        title: &str,
    ) -> Result<Self, ExportError> {
        let encoder = PngPanelEncoder::new();

        let mut slices = Vec::with_capacity(volume.slice_count());
        for index in 0..volume.slice_count() {
            let image = volume.slice_image(index as i64)?;
            slices.push(encoder.encode_data_uri(&image, &format!("slice {}", index))?);
        }

        let mut images = Vec::with_capacity(table.len());
        for entry in table.entries() {
            images.push(PayloadImage {
                id: entry.id(),
                filename: entry.filename().to_string(),
                position: entry.position(),
                caption: composer.caption(entry),
                src: encoder.encode_data_uri(&**entry.image(), entry.filename())?,
            });
        }

        let positions: HashMap<EntryId, usize> = table
            .entries()
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.id(), i))
            .collect();
        let lookup = (0..volume.slice_count())
            .map(|index| {
                composer
                    .resolver()
                    .resolve(table, index)
                    .and_then(|hit| positions.get(&hit.id()).copied())
            })
            .collect();

        debug!(
            slices = slices.len(),
            images = images.len(),
            policy = composer.resolver().name(),
            "Built artifact payload"
        );

        Ok(Self {
            version: PAYLOAD_VERSION,
            title: title.to_string(),
            volume: volume.filename().to_string(),
            policy: composer.resolver().name().to_string(),
            placeholder: PLACEHOLDER_TEXT.to_string(),
            slice_count: volume.slice_count(),
            width: volume.width(),
            height: volume.height(),
            slices,
            images,
            lookup,
        })
    }

    /// The image the artifact shows at `index`, as its script would pick it.
    pub fn resolve(&self, index: i64) -> Option<&PayloadImage> {
        let index = usize::try_from(index).ok()?;
        let image = (*self.lookup.get(index)?)?;
        self.images.get(image)
    }

    /// `(slice, entry id)` for every slice.
    pub fn mapping(&self) -> Vec<(usize, Option<EntryId>)> {
        (0..self.slice_count)
            .map(|index| (index, self.resolve(index as i64).map(|image| image.id)))
            .collect()
    }

    /// SHA-256 over the resolved mapping, hex encoded.
    ///
    /// Equal fingerprints mean every slice shows the same entry.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (index, id) in self.mapping() {
            match id {
                Some(id) => hasher.update(format!("{}:{}\n", index, id)),
                None => hasher.update(format!("{}:-\n", index)),
            }
        }
        hex::encode(hasher.finalize())
    }
}
