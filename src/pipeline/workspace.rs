//! Per-request scratch directories.
//!
//! pdfium needs a file-system path, so every request stages its upload and
//! its converted units in a directory of its own, named by a fresh UUID under
//! the configured workspace root. The directory is a [`TempDir`], so it is
//! removed on every exit path: explicitly via [`Workspace::close`] on the
//! normal path, or on drop when a task is aborted or panics.

use crate::error::Pdf2ImgError;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// A uniquely named scratch directory, deleted with its contents.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    dir: TempDir,
}

impl Workspace {
    /// Create a new workspace below `root`, creating `root` if needed.
    pub fn open(root: &Path) -> Result<Self, Pdf2ImgError> {
        std::fs::create_dir_all(root).map_err(|source| Pdf2ImgError::Workspace {
            path: root.to_path_buf(),
            source,
        })?;

        let id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&id.to_string())
            .rand_bytes(0)
            .tempdir_in(root)
            .map_err(|source| Pdf2ImgError::Workspace {
                path: root.join(id.to_string()),
                source,
            })?;
        debug!(workspace = %id, "Workspace created at {}", dir.path().display());
        Ok(Self { id, dir })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory and everything in it.
    ///
    /// A failure is logged and swallowed: the response is already decided by
    /// the time a workspace is closed.
    pub fn close(self) {
        let id = self.id;
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(workspace = %id, "Workspace removed"),
            Err(e) => warn!(workspace = %id, "Failed to remove {}: {}", path.display(), e),
        }
    }
}
