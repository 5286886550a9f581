//! Composition and rendering of the dual view.
//!
//! - [`DualViewComposer`] turns `(volume, table, index)` into a
//!   [`ComposedView`] holding both panels
//! - [`PngPanelEncoder`] encodes panels for browsers and artifacts
//! - [`SliceCache`] memoizes encoded slices for the live server

mod cache;
mod composer;
mod encoder;

pub use cache::{SliceCache, SliceCacheKey, DEFAULT_SLICE_CACHE_CAPACITY};
pub use composer::{
    slice_title, ComposedView, DualViewComposer, FrameDescription, FrameImage, ImagePanel,
    SlicePanel, SliderControl, DEFAULT_CAPTION_PREFIX, PLACEHOLDER_TEXT,
};
pub use encoder::{to_data_uri, PngPanelEncoder, PNG_MIME};
