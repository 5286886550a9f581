//! Slice → registered image resolution policies.

use serde::{Deserialize, Serialize};

use super::{RegistrationEntry, RegistrationTable};

/// Maps a slice index to the registered entry to display, if any.
///
/// Resolvers are stateless; they only read the table.
pub trait SliceResolver: Send + Sync {
    fn resolve<'a>(
        &self,
        table: &'a RegistrationTable,
        index: usize,
    ) -> Option<&'a RegistrationEntry>;

    /// Short policy name for logs and artifacts.
    fn name(&self) -> &'static str;
}

/// Only an image registered at exactly `index` matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl SliceResolver for ExactMatch {
    fn resolve<'a>(
        &self,
        table: &'a RegistrationTable,
        index: usize,
    ) -> Option<&'a RegistrationEntry> {
        let index = i64::try_from(index).ok()?;
        table.resolve(index)
    }

    fn name(&self) -> &'static str {
        "exact"
    }
}

/// The closest registration at or below `index`.
///
/// Among entries sharing that position, the most recently added wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestBelow;

impl SliceResolver for NearestBelow {
    fn resolve<'a>(
        &self,
        table: &'a RegistrationTable,
        index: usize,
    ) -> Option<&'a RegistrationEntry> {
        let mut best: Option<&RegistrationEntry> = None;
        // Walking newest-first, a strict comparison keeps the latest of ties
        for entry in table.entries().iter().rev() {
            if entry.position() > index {
                continue;
            }
            if best.map_or(true, |b| entry.position() > b.position()) {
                best = Some(entry);
            }
        }
        best
    }

    fn name(&self) -> &'static str {
        "nearest-below"
    }
}

/// Resolution policy selectable from configuration.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPolicy {
    /// Show an image only on the slice it is registered at
    #[default]
    Exact,

    /// Keep showing the closest image registered below the slice
    NearestBelow,
}

impl ResolutionPolicy {
    pub fn resolver(self) -> &'static dyn SliceResolver {
        match self {
            ResolutionPolicy::Exact => &ExactMatch,
            ResolutionPolicy::NearestBelow => &NearestBelow,
        }
    }
}

impl SliceResolver for ResolutionPolicy {
    fn resolve<'a>(
        &self,
        table: &'a RegistrationTable,
        index: usize,
    ) -> Option<&'a RegistrationEntry> {
        self.resolver().resolve(table, index)
    }

    fn name(&self) -> &'static str {
        self.resolver().name()
    }
}
