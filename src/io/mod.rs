//! Byte access for volume containers.
//!
//! The TIFF parser works against the [`RangeReader`] trait rather than a file
//! handle, so the same code reads stacks from disk ([`FileReader`]) and from
//! in-memory buffers ([`MemoryReader`]).

mod file_reader;
mod range_reader;

pub use file_reader::{FileReader, MemoryReader};
pub use range_reader::RangeReader;
