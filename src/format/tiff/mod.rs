//! TIFF parser for volume stacks.
//!
//! Handles classic TIFF and BigTIFF containers in both byte orders. A volume
//! stack is a chain of IFDs, one per slice, each describing an uncompressed
//! strip-organized plane.
//!
//! # Key Concepts
//!
//! - **Byte order**: declared in the header (II = little-endian, MM =
//!   big-endian). Every multi-byte value, including 16-bit samples, follows it.
//!
//! - **Classic TIFF vs BigTIFF**: 32-bit vs 64-bit offsets. Large micro-CT
//!   exports are usually BigTIFF.
//!
//! - **Inline vs offset values**: small values live in the IFD entry, larger
//!   ones (strip tables) at an offset the entry points to.

mod parser;
mod stack;
mod tags;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use stack::{PageLayout, Photometric, TiffStack, MAX_PAGES};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::{parse_u64_array, ValueReader};
