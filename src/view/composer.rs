//! The dual view: one slice index driving two panels.
//!
//! For a given index the composer fetches the volume slice and asks its
//! resolver for the matching registered image. Both panels are always
//! produced together; on a miss the image panel is a placeholder and never
//! the previously shown image.

use ndarray::ArrayView2;
use serde::Serialize;

use crate::error::SliceError;
use crate::registration::{
    EntryId, ExactMatch, RegistrationEntry, RegistrationTable, SliceResolver,
};
use crate::volume::VolumeHandle;

/// Caption prefix of the image panel.
pub const DEFAULT_CAPTION_PREFIX: &str = "Histology";

/// Shown in the image panel when no entry resolves.
pub const PLACEHOLDER_TEXT: &str = "No registered image for this slice";

// =============================================================================
// ComposedView
// =============================================================================

/// Slider state over `[0, slice_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SliderControl {
    pub min: usize,
    pub max: usize,
    pub value: usize,

    /// Set for one-slice volumes: there is nothing to slide over
    pub fixed: bool,
}

impl SliderControl {
    pub fn new(slice_count: usize, value: usize) -> Self {
        Self {
            min: 0,
            max: slice_count.saturating_sub(1),
            value,
            fixed: slice_count <= 1,
        }
    }
}

/// Left panel: the volume slice at the current index.
#[derive(Debug, Clone)]
pub struct SlicePanel<'a> {
    pub title: String,
    pub plane: ArrayView2<'a, u8>,
}

/// Right panel: the resolved image, or a placeholder.
#[derive(Debug, Clone)]
pub enum ImagePanel<'a> {
    Registered {
        entry: &'a RegistrationEntry,
        caption: String,
    },
    Placeholder {
        message: &'static str,
    },
}

impl<'a> ImagePanel<'a> {
    pub fn entry(&self) -> Option<&'a RegistrationEntry> {
        match self {
            ImagePanel::Registered { entry, .. } => Some(*entry),
            ImagePanel::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ImagePanel::Placeholder { .. })
    }
}

/// Both panels for one slice index.
#[derive(Debug, Clone)]
pub struct ComposedView<'a> {
    pub index: usize,
    pub slice_count: usize,
    pub slider: SliderControl,
    pub slice: SlicePanel<'a>,
    pub image: ImagePanel<'a>,
}

impl ComposedView<'_> {
    /// Pixel-free description of the view, for JSON clients.
    pub fn describe(&self) -> FrameDescription {
        let image = match &self.image {
            ImagePanel::Registered { entry, caption } => FrameImage::Registered {
                id: entry.id(),
                filename: entry.filename().to_string(),
                position: entry.position(),
                caption: caption.clone(),
            },
            ImagePanel::Placeholder { message } => FrameImage::Placeholder {
                message: (*message).to_string(),
            },
        };

        FrameDescription {
            index: self.index,
            slice_count: self.slice_count,
            slider: self.slider,
            slice_title: self.slice.title.clone(),
            image,
        }
    }
}

/// Serializable form of a [`ComposedView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameDescription {
    pub index: usize,
    pub slice_count: usize,
    pub slider: SliderControl,
    pub slice_title: String,
    pub image: FrameImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameImage {
    Registered {
        id: EntryId,
        filename: String,
        position: usize,
        caption: String,
    },
    Placeholder {
        message: String,
    },
}

// =============================================================================
// DualViewComposer
// =============================================================================

/// Builds [`ComposedView`]s. Holds no state besides its policy.
#[derive(Debug, Clone)]
pub struct DualViewComposer<R: SliceResolver = ExactMatch> {
    resolver: R,
    caption_prefix: String,
}

impl DualViewComposer<ExactMatch> {
    pub fn new() -> Self {
        Self::with_resolver(ExactMatch)
    }
}

impl Default for DualViewComposer<ExactMatch> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SliceResolver> DualViewComposer<R> {
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver,
            caption_prefix: DEFAULT_CAPTION_PREFIX.to_string(),
        }
    }

    pub fn caption_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.caption_prefix = prefix.into();
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Compose both panels for `index`.
    ///
    /// # Errors
    /// `SliceError::IndexOutOfRange` if `index` is outside the volume.
    pub fn compose<'a>(
        &self,
        volume: &'a VolumeHandle,
        table: &'a RegistrationTable,
        index: i64,
    ) -> Result<ComposedView<'a>, SliceError> {
        let plane = volume.slice_at(index)?;
        let index = volume.check_index(index)?;

        let image = match self.resolver.resolve(table, index) {
            Some(entry) => ImagePanel::Registered {
                entry,
                caption: self.caption(entry),
            },
            None => ImagePanel::Placeholder {
                message: PLACEHOLDER_TEXT,
            },
        };

        Ok(ComposedView {
            index,
            slice_count: volume.slice_count(),
            slider: SliderControl::new(volume.slice_count(), index),
            slice: SlicePanel {
                title: slice_title(index),
                plane,
            },
            image,
        })
    }

    /// Caption shown above a registered image.
    pub fn caption(&self, entry: &RegistrationEntry) -> String {
        format!("{} {}", self.caption_prefix, entry.filename())
    }
}

/// Title of the slice panel.
pub fn slice_title(index: usize) -> String {
    format!("CT slice {}", index)
}
