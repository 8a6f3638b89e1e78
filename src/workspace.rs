//! Per-request scratch directories.
//!
//! Each execution gets its own directory under the configured root, named with a
//! fresh UUID. The directory holds exactly one source file when the container
//! starts and is bind-mounted read-write so the compiler can drop its artifact
//! next to it. The directory is removed when the [`Workspace`] is closed or
//! dropped, whichever comes first.

use crate::error::ExecError;
use crate::protocol::SOURCE_FILE;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

#[derive(Debug)]
pub struct Workspace {
    id: String,
    dir: TempDir,
}

impl Workspace {
    /// Create a uniquely named workspace under `root`.
    pub fn acquire(root: &Path) -> Result<Self, ExecError> {
        fs::create_dir_all(root)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let dir = tempfile::Builder::new()
            .prefix(&format!("runbox-{id}-"))
            .tempdir_in(root)?;
        debug!(workspace = %dir.path().display(), "Workspace created");
        Ok(Self { id, dir })
    }

    /// Write the submission verbatim to the fixed source filename.
    pub fn write_source(&self, text: &str) -> Result<PathBuf, ExecError> {
        let path = self.source_path();
        fs::write(&path, text)?;
        Ok(path)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Absolute host path to bind into the container.
    pub fn host_path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join(SOURCE_FILE)
    }

    /// Remove the workspace now, reporting what `Drop` would ignore.
    pub fn close(self) -> Result<(), ExecError> {
        self.dir.close()?;
        Ok(())
    }
}
