//! One volume with its registrations.
//!
//! A [`Session`] owns exactly one [`VolumeHandle`] and the
//! [`RegistrationTable`] bound to it. Sessions never share state; the server
//! keeps one per browser workspace and the CLI builds one per invocation.

use std::path::Path;

use tracing::info;

use crate::error::{RegistrationError, SessionError, SliceError};
use crate::manifest::Manifest;
use crate::registration::{EntryId, RegistrationTable, SliceResolver};
use crate::view::{ComposedView, DualViewComposer};
use crate::volume::VolumeHandle;

#[derive(Debug, Clone)]
pub struct Session {
    volume: VolumeHandle,
    registrations: RegistrationTable,
}

impl Session {
    /// Session over `volume` with an empty table.
    pub fn new(volume: VolumeHandle) -> Self {
        let registrations = RegistrationTable::for_volume(&volume);
        Self {
            volume,
            registrations,
        }
    }

    /// Load the volume at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        Ok(Self::new(VolumeHandle::load(path)?))
    }

    /// Load the manifest's volume and register its images in order.
    ///
    /// Stops at the first registration that fails.
    pub fn from_manifest(manifest: &Manifest) -> Result<Self, SessionError> {
        let mut session = Self::open(&manifest.volume)?;
        for registration in &manifest.registrations {
            session.register_path(&registration.image, registration.position)?;
        }

        info!(
            volume = %manifest.volume.display(),
            registrations = session.registrations.len(),
            "Opened session from manifest"
        );
        Ok(session)
    }

    pub fn volume(&self) -> &VolumeHandle {
        &self.volume
    }

    pub fn registrations(&self) -> &RegistrationTable {
        &self.registrations
    }

    pub fn registrations_mut(&mut self) -> &mut RegistrationTable {
        &mut self.registrations
    }

    /// Decode the image at `path` and register it at `position`.
    pub fn register_path(
        &mut self,
        path: impl AsRef<Path>,
        position: i64,
    ) -> Result<EntryId, RegistrationError> {
        self.registrations.add_from_path(path, position)
    }

    /// Compose the dual view at `index`.
    pub fn compose<'a, R: SliceResolver>(
        &'a self,
        composer: &DualViewComposer<R>,
        index: i64,
    ) -> Result<ComposedView<'a>, SliceError> {
        composer.compose(&self.volume, &self.registrations, index)
    }
}
