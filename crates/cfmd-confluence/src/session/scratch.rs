//! Scoped scratch file for editor sessions.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::TempPath;
use tracing::warn;

use crate::error::ResourceCleanupFailed;

/// Modification timestamp of the scratch file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModificationMarker(pub SystemTime);

/// Temporary Markdown file owned by one edit session.
///
/// The file is removed when the value is dropped, on every exit path.
/// A failed removal is logged and never propagated.
#[derive(Debug)]
pub struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    /// Create `cfmd-*.md` in the system temp directory with `content`.
    pub fn create(content: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("cfmd-")
            .suffix(".md")
            .tempfile()?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(Self {
            path: Some(file.into_temp_path()),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Current modification marker.
    pub fn marker(&self) -> io::Result<ModificationMarker> {
        Ok(ModificationMarker(fs::metadata(self.path())?.modified()?))
    }

    pub fn read(&self) -> io::Result<String> {
        fs::read_to_string(self.path())
    }

    /// Remove the file now, reporting failure.
    pub fn release(mut self) -> Result<(), ResourceCleanupFailed> {
        self.remove()
    }

    fn remove(&mut self) -> Result<(), ResourceCleanupFailed> {
        let Some(temp_path) = self.path.take() else {
            return Ok(());
        };
        let path: PathBuf = temp_path.to_path_buf();
        match temp_path.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ResourceCleanupFailed { path, source }),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("{}: {}", e, e.source);
        }
    }
}
