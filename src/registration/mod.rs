//! Registered 2D images and how slices resolve to them.
//!
//! A [`RegistrationTable`] pins 2D images (histology sections, photographs)
//! to slice positions of one volume. A [`SliceResolver`] decides which entry,
//! if any, belongs to a given slice index. [`ExactMatch`] is the default:
//! only an image registered at exactly that index is shown, and when several
//! share a position the most recently added one wins.

mod entry;
mod resolver;
mod table;

pub use entry::{EntryId, Listing, ParseEntryIdError, RegistrationEntry};
pub use resolver::{ExactMatch, NearestBelow, ResolutionPolicy, SliceResolver};
pub use table::{load_rgb_image, RegistrationTable};
