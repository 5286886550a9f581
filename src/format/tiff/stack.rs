//! Multi-page TIFF stacks.
//!
//! Micro-CT reconstructions are commonly exported as one TIFF holding every
//! slice as its own page (IFD). [`TiffStack`] walks the page chain, checks that
//! each page is a strip-organized, uncompressed greyscale or RGB plane, and
//! decodes pages to 8-bit intensities.
//!
//! # Supported layouts
//!
//! | SamplesPerPixel | BitsPerSample | Photometric          |
//! |-----------------|---------------|----------------------|
//! | 1               | 8 or 16       | WhiteIsZero / BlackIsZero |
//! | 3               | 8 or 16       | RGB (reduced to luma)|
//!
//! 16-bit samples keep their high byte, so `0..=65535` maps onto `0..=255`.

use std::collections::HashSet;

use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{Compression, TiffTag};
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of pages walked before the chain is considered corrupt.
pub const MAX_PAGES: usize = 65_536;

/// Maximum entries accepted in one IFD.
const MAX_IFD_ENTRIES: u64 = 4_096;

// =============================================================================
// PageLayout
// =============================================================================

/// How a page encodes intensities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Photometric {
    WhiteIsZero,
    BlackIsZero,
    Rgb,
}

/// Decoded strip layout of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub photometric: Photometric,
    pub strip_offsets: Vec<u64>,
    pub strip_byte_counts: Vec<u64>,
}

impl PageLayout {
    /// Bytes of raw sample data the page must provide, `None` on overflow.
    pub fn expected_bytes(&self) -> Option<u64> {
        (self.width as u64)
            .checked_mul(self.height as u64)?
            .checked_mul(self.samples_per_pixel as u64)?
            .checked_mul(self.bits_per_sample as u64 / 8)
    }

    /// Check the declared dimensions against the data that backs them.
    ///
    /// A page may not claim more sample bytes than its strips hold or than the
    /// whole file holds, so nothing is sized from untrusted tags alone.
    fn check_backing(&self, file_size: u64) -> Result<u64, TiffError> {
        let expected = self.expected_bytes().ok_or_else(|| TiffError::InvalidTagValue {
            tag: TiffTag::ImageWidth.name(),
            message: format!("page {}x{} overflows", self.width, self.height),
        })?;
        let strip_total = self
            .strip_byte_counts
            .iter()
            .try_fold(0u64, |total, &count| total.checked_add(count))
            .unwrap_or(u64::MAX);

        if expected > file_size || expected > strip_total {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::StripByteCounts.name(),
                message: format!(
                    "page {}x{} needs {} bytes, strips hold {} in a {} byte file",
                    self.width, self.height, expected, strip_total, file_size
                ),
            });
        }
        Ok(expected)
    }

    fn from_ifd<R: RangeReader>(
        ifd: &Ifd,
        values: &ValueReader<'_, R>,
        file_size: u64,
    ) -> Result<Self, TiffError> {
        let order = values.byte_order();

        if ifd.has_tag(TiffTag::TileWidth) {
            return Err(TiffError::UnsupportedLayout(
                "tiled pages are not supported in volume stacks".to_string(),
            ));
        }

        let compression = Compression::from_u16(ifd.compression(order).unwrap_or(1));
        if let Compression::Other(code) = compression {
            return Err(TiffError::UnsupportedCompression(code));
        }

        let width = required_u32(ifd, values, TiffTag::ImageWidth)?;
        let height = required_u32(ifd, values, TiffTag::ImageLength)?;
        if width == 0 || height == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::ImageWidth.name(),
                message: format!("empty page {}x{}", width, height),
            });
        }

        let samples_per_pixel = optional_u32(ifd, values, TiffTag::SamplesPerPixel)?.unwrap_or(1);
        let bits_per_sample = read_bits_per_sample(ifd, values, samples_per_pixel)?;

        if let Some(format) = optional_u32(ifd, values, TiffTag::SampleFormat)? {
            if format != 1 {
                return Err(TiffError::UnsupportedLayout(format!(
                    "sample format {} (only unsigned integers are supported)",
                    format
                )));
            }
        }

        let planar = optional_u32(ifd, values, TiffTag::PlanarConfiguration)?.unwrap_or(1);
        if planar != 1 && samples_per_pixel > 1 {
            return Err(TiffError::UnsupportedLayout(
                "planar RGB pages are not supported".to_string(),
            ));
        }

        let photometric = match (
            samples_per_pixel,
            optional_u32(ifd, values, TiffTag::PhotometricInterpretation)?,
        ) {
            (1, Some(0)) => Photometric::WhiteIsZero,
            (1, Some(1)) | (1, None) => Photometric::BlackIsZero,
            (3, Some(2)) | (3, None) => Photometric::Rgb,
            (samples, photometric) => {
                return Err(TiffError::UnsupportedLayout(format!(
                    "{} samples per pixel with photometric {:?}",
                    samples, photometric
                )))
            }
        };

        if bits_per_sample != 8 && bits_per_sample != 16 {
            return Err(TiffError::UnsupportedLayout(format!(
                "{} bits per sample (only 8 and 16 are supported)",
                bits_per_sample
            )));
        }

        let strip_offsets = required_array(ifd, values, TiffTag::StripOffsets)?;
        let strip_byte_counts = required_array(ifd, values, TiffTag::StripByteCounts)?;
        if strip_offsets.len() != strip_byte_counts.len() {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::StripByteCounts.name(),
                message: format!(
                    "{} strip offsets but {} byte counts",
                    strip_offsets.len(),
                    strip_byte_counts.len()
                ),
            });
        }

        let page = Self {
            width,
            height,
            bits_per_sample: bits_per_sample as u16,
            samples_per_pixel: samples_per_pixel as u16,
            photometric,
            strip_offsets,
            strip_byte_counts,
        };
        page.check_backing(file_size)?;
        Ok(page)
    }
}

fn required_u32<R: RangeReader>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
    tag: TiffTag,
) -> Result<u32, TiffError> {
    optional_u32(ifd, values, tag)?.ok_or(TiffError::MissingTag(tag.name()))
}

fn optional_u32<R: RangeReader>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
    tag: TiffTag,
) -> Result<Option<u32>, TiffError> {
    ifd.get_entry_by_tag(tag)
        .map(|entry| values.read_u32(entry, tag))
        .transpose()
}

fn required_array<R: RangeReader>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
    tag: TiffTag,
) -> Result<Vec<u64>, TiffError> {
    let entry = ifd
        .get_entry_by_tag(tag)
        .ok_or(TiffError::MissingTag(tag.name()))?;
    values.read_u64_array(entry, tag)
}

/// BitsPerSample carries one value per sample; they must agree.
fn read_bits_per_sample<R: RangeReader>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
    samples_per_pixel: u32,
) -> Result<u32, TiffError> {
    let Some(entry) = ifd.get_entry_by_tag(TiffTag::BitsPerSample) else {
        return Ok(1);
    };

    let bits = values.read_u64_array(entry, TiffTag::BitsPerSample)?;
    let first = bits.first().copied().unwrap_or(1);
    if bits.iter().any(|&b| b != first) || (bits.len() > 1 && bits.len() as u32 != samples_per_pixel) {
        return Err(TiffError::UnsupportedLayout(format!(
            "mixed bits per sample {:?}",
            bits
        )));
    }
    Ok(first as u32)
}

// =============================================================================
// TiffStack
// =============================================================================

/// A TIFF file interpreted as an ordered stack of equally sized pages.
#[derive(Debug, Clone)]
pub struct TiffStack {
    header: TiffHeader,
    pages: Vec<PageLayout>,
}

impl TiffStack {
    /// Parse the header and every page layout.
    ///
    /// Page dimensions are not compared here; the volume loader reports
    /// mismatches with the offending slice index.
    pub fn open<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let probe = reader.read_prefix(BIGTIFF_HEADER_SIZE)?;
        let header = TiffHeader::parse(&probe, reader.size())?;
        let values = ValueReader::new(reader, &header);

        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 {
            if !seen.insert(offset) || pages.len() >= MAX_PAGES {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let ifd = read_ifd(reader, &header, offset)?;
            pages.push(PageLayout::from_ifd(&ifd, &values, reader.size())?);
            offset = ifd.next_ifd_offset;
        }

        debug!(
            source = reader.identifier(),
            pages = pages.len(),
            bigtiff = header.is_bigtiff,
            "Parsed TIFF stack"
        );

        Ok(Self { header, pages })
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PageLayout] {
        &self.pages
    }

    /// Decode one page to row-major 8-bit intensities (`width * height`).
    pub fn decode_page<R: RangeReader>(
        &self,
        reader: &R,
        index: usize,
    ) -> Result<Vec<u8>, TiffError> {
        let page = self.pages.get(index).ok_or_else(|| TiffError::InvalidTagValue {
            tag: "page",
            message: format!("page {} of {}", index, self.pages.len()),
        })?;

        let expected = page.check_backing(reader.size())?;
        let mut raw = Vec::with_capacity(expected as usize);
        for (&offset, &count) in page.strip_offsets.iter().zip(&page.strip_byte_counts) {
            if raw.len() as u64 >= expected {
                break;
            }
            let count = usize::try_from(count).map_err(|_| TiffError::InvalidTagValue {
                tag: TiffTag::StripByteCounts.name(),
                message: format!("strip of {} bytes", count),
            })?;
            raw.extend_from_slice(&reader.read_exact_at(offset, count)?);
        }

        if (raw.len() as u64) < expected {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::StripByteCounts.name(),
                message: format!(
                    "page {} strips hold {} bytes, {} required",
                    index,
                    raw.len(),
                    expected
                ),
            });
        }
        raw.truncate(expected as usize);

        Ok(to_intensities(&raw, page, self.header.byte_order))
    }
}

fn read_ifd<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    offset: u64,
) -> Result<Ifd, TiffError> {
    let count_bytes = reader.read_exact_at(offset, header.ifd_count_size())?;
    let entry_count = Ifd::parse_entry_count(&count_bytes, header);
    if entry_count > MAX_IFD_ENTRIES {
        return Err(TiffError::InvalidTagValue {
            tag: "IFD",
            message: format!("{} entries at offset {}", entry_count, offset),
        });
    }

    let ifd_bytes = reader.read_exact_at(offset, Ifd::calculate_size(entry_count, header))?;
    Ifd::parse(&ifd_bytes, header)
}

/// Reduce raw samples to one 8-bit intensity per pixel.
fn to_intensities(raw: &[u8], page: &PageLayout, order: ByteOrder) -> Vec<u8> {
    let samples: Vec<u8> = match page.bits_per_sample {
        16 => raw
            .chunks_exact(2)
            .map(|pair| (order.read_u16(pair) >> 8) as u8)
            .collect(),
        _ => raw.to_vec(),
    };

    match page.photometric {
        Photometric::BlackIsZero => samples,
        Photometric::WhiteIsZero => samples.into_iter().map(|v| 255 - v).collect(),
        Photometric::Rgb => samples
            .chunks_exact(3)
            .map(|rgb| luma(rgb[0], rgb[1], rgb[2]))
            .collect(),
    }
}

/// Rec. 709 luma, the same weights `image` uses for RGB → Luma.
#[inline]
pub(crate) fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((2126 * r as u32 + 7152 * g as u32 + 722 * b as u32 + 5000) / 10_000) as u8
}

// =============================================================================
// Tests
// =============================================================================
