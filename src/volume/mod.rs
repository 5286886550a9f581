//! The 3D volume: an immutable stack of 8-bit slices.
//!
//! ```text
//!   path ──► detect_source ──► TiffStack ──┐
//!                         └──► slice dir ──┴──► VolumeHandle (Array3<u8>)
//!                                                  │
//!                                 slice_at(i) ◄────┘
//! ```
//!
//! A [`VolumeHandle`] is never mutated after it is built; loading another
//! volume produces a new handle.

mod handle;
mod loader;

pub use handle::VolumeHandle;
pub use loader::VolumeLoader;
