//! Mock content directory served by the notebook under test

use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::E2eResult;

/// Default prefix for the temporary directory name
pub const DEFAULT_PREFIX: &str = "mock_contents";

/// Subdirectory created inside the workspace
pub const SEED_DIR: &str = "src";

/// Seed file created inside [`SEED_DIR`]
pub const SEED_FILE: &str = "temp.txt";

/// Contents of the seed file
pub const SEED_CONTENTS: &str = "hello";

/// Temporary content root for the notebook server.
///
/// The directory is removed when [`MockWorkspace::close`] is called or the
/// value is dropped. Removal errors are ignored.
#[derive(Debug)]
pub struct MockWorkspace {
    dir: TempDir,
}

impl MockWorkspace {
    /// Create a fresh workspace holding `src/temp.txt` in the system temp dir
    pub fn create(prefix: &str) -> E2eResult<Self> {
        Self::with_dir(tempfile::Builder::new().prefix(prefix).tempdir()?)
    }

    /// Like [`MockWorkspace::create`], but inside `parent`
    pub fn create_in(parent: &Path, prefix: &str) -> E2eResult<Self> {
        Self::with_dir(tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?)
    }

    fn with_dir(dir: TempDir) -> E2eResult<Self> {
        let seed_dir = dir.path().join(SEED_DIR);
        std::fs::create_dir(&seed_dir)?;
        std::fs::write(seed_dir.join(SEED_FILE), SEED_CONTENTS)?;

        info!("Created mock workspace at {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Root of the workspace
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the workspace, ignoring errors
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            debug!("Ignoring workspace cleanup error for {}: {}", path.display(), e);
        }
    }
}
