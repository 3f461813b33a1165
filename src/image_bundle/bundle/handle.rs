use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::image_bundle::bundle::format;
use crate::image_bundle::bundle::reader::BundleReader;
use crate::image_bundle::bundle::types::BundleConfig;
use crate::image_bundle::bundle::writer::BundleWriter;
use crate::image_bundle::codec::CodecRegistry;
use crate::image_bundle::common::error::{BundleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleMode {
    Read,
    Write,
}

enum Session {
    Closed,
    Reading(BundleReader),
    Writing(BundleWriter),
}

/// A bundle path bound to at most one open session at a time.
pub struct ImageBundle {
    path: PathBuf,
    registry: Arc<CodecRegistry>,
    config: BundleConfig,
    session: Session,
}

impl ImageBundle {
    pub fn new<P: AsRef<Path>>(path: P, registry: Arc<CodecRegistry>, config: BundleConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            registry,
            config,
            session: Session::Closed,
        }
    }

    /// Opens `path` in `mode` in one step. `overwrite` only matters for writes.
    pub fn open_path<P: AsRef<Path>>(
        path: P,
        mode: BundleMode,
        overwrite: bool,
        registry: Arc<CodecRegistry>,
        config: BundleConfig,
    ) -> Result<Self> {
        let mut bundle = Self::new(path, registry, config);
        bundle.open(mode, overwrite)?;
        Ok(bundle)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data file a writer would create for this bundle.
    pub fn data_path(&self) -> PathBuf {
        format::data_path_for(&self.path, &self.config.data_suffix)
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    pub fn mode(&self) -> Option<BundleMode> {
        match self.session {
            Session::Closed => None,
            Session::Reading(_) => Some(BundleMode::Read),
            Session::Writing(_) => Some(BundleMode::Write),
        }
    }

    /// Fails with a state error if a session is already open.
    pub fn open(&mut self, mode: BundleMode, overwrite: bool) -> Result<()> {
        if let Some(current) = self.mode() {
            return Err(BundleError::State(format!(
                "bundle {} is already open for {:?}; close it first",
                self.path.display(),
                current
            )));
        }
        self.session = match mode {
            BundleMode::Read => Session::Reading(BundleReader::open(
                &self.path,
                self.registry.clone(),
                &self.config,
            )?),
            BundleMode::Write => Session::Writing(BundleWriter::open(
                &self.path,
                overwrite,
                self.registry.clone(),
                &self.config,
            )?),
        };
        debug!("Bundle {} open for {:?}", self.path.display(), mode);
        Ok(())
    }

    pub fn reader(&mut self) -> Result<&mut BundleReader> {
        match &mut self.session {
            Session::Reading(reader) => Ok(reader),
            _ => Err(BundleError::State(format!(
                "bundle {} is not open for reading",
                self.path.display()
            ))),
        }
    }

    pub fn writer(&mut self) -> Result<&mut BundleWriter> {
        match &mut self.session {
            Session::Writing(writer) => Ok(writer),
            _ => Err(BundleError::State(format!(
                "bundle {} is not open for writing",
                self.path.display()
            ))),
        }
    }

    /// Closes the open session, if any, and returns the handle to its
    /// unopened state so it can be reopened in either mode.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.session, Session::Closed) {
            Session::Closed => Ok(()),
            Session::Reading(mut reader) => reader.close(),
            Session::Writing(mut writer) => writer.close(),
        }
    }
}

impl std::fmt::Debug for ImageBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBundle")
            .field("path", &self.path)
            .field("mode", &self.mode())
            .finish()
    }
}
