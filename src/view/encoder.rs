//! PNG panel encoder.
//!
//! Slices and registered images are delivered to browsers as PNG, either as
//! HTTP responses or as base64 data URIs embedded in an exported artifact.
//!
//! # Design Decisions
//!
//! - **Lossless**: micro-CT intensities are shown exactly as loaded, so PNG
//!   rather than JPEG.
//!
//! - **Deterministic**: the same pixels always encode to the same bytes, which
//!   keeps repeated exports identical.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{EncodableLayout, ImageBuffer, PixelWithColorType};

use crate::error::EncodeError;

/// MIME type of every encoded panel.
pub const PNG_MIME: &str = "image/png";

// =============================================================================
// PNG Encoder
// =============================================================================

/// Encodes greyscale slices and RGB images as PNG.
#[derive(Debug, Clone, Copy)]
pub struct PngPanelEncoder {
    compression: CompressionType,
}

impl PngPanelEncoder {
    pub fn new() -> Self {
        Self {
            compression: CompressionType::Default,
        }
    }

    /// Faster, larger output. Used for interactive serving.
    pub fn fast() -> Self {
        Self {
            compression: CompressionType::Fast,
        }
    }

    /// Encode `image` as PNG.
    ///
    /// `what` names the panel in error messages (e.g. `"slice 4"`).
    pub fn encode<P>(
        &self,
        image: &ImageBuffer<P, Vec<P::Subpixel>>,
        what: &str,
    ) -> Result<Bytes, EncodeError>
    where
        P: PixelWithColorType,
        [P::Subpixel]: EncodableLayout,
    {
        let mut output = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut output, self.compression, FilterType::Adaptive);

        image
            .write_with_encoder(encoder)
            .map_err(|e| EncodeError {
                what: what.to_string(),
                message: e.to_string(),
            })?;

        Ok(Bytes::from(output))
    }

    /// Encode `image` and wrap it as a `data:image/png;base64,` URI.
    pub fn encode_data_uri<P>(
        &self,
        image: &ImageBuffer<P, Vec<P::Subpixel>>,
        what: &str,
    ) -> Result<String, EncodeError>
    where
        P: PixelWithColorType,
        [P::Subpixel]: EncodableLayout,
    {
        Ok(to_data_uri(&self.encode(image, what)?))
    }
}

impl Default for PngPanelEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap PNG bytes as a data URI.
pub fn to_data_uri(png: &[u8]) -> String {
    format!("data:{};base64,{}", PNG_MIME, STANDARD.encode(png))
}

// =============================================================================
// Tests
// =============================================================================
