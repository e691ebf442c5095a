//! Per-invocation scratch directory

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

/// A unique scratch directory for one run, removed when dropped.
///
/// Downloaded artifacts, generator inputs and built images all live here, so
/// concurrent runs on one host never share files.
#[derive(Debug)]
pub struct RunWorkspace {
    dir: TempDir,
}

impl RunWorkspace {
    /// Create a fresh directory under the system temp dir
    pub fn create() -> std::io::Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// Create a fresh directory under `parent`
    pub fn create_in(parent: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("fleet-").tempdir_in(parent)?;
        debug!("Run workspace at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the workspace
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspaces_are_unique_and_cleaned_up() {
        let parent = tempfile::tempdir().unwrap();
        let a = RunWorkspace::create_in(parent.path()).unwrap();
        let b = RunWorkspace::create_in(parent.path()).unwrap();
        assert_ne!(a.path(), b.path());

        let path = a.path().to_path_buf();
        std::fs::write(a.file("x.bin"), b"x").unwrap();
        drop(a);
        assert!(!path.exists());
        assert!(b.path().exists());
    }

    #[test]
    fn test_directory_prefix() {
        let parent = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create_in(parent.path()).unwrap();
        assert!(ws
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("fleet-"));
    }
}
