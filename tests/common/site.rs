//! Temporary static directories for the server to serve

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A throwaway static root. Removed when dropped.
pub struct TestSite {
    temp_dir: TempDir,
}

impl TestSite {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// A site with the pages most tests expect.
    pub fn basic() -> Self {
        Self::new()
            .file("index.html", "<h1>Home</h1>")
            .file("style.css", "body { background-color: white; }")
            .file("docs/index.html", "<h1>Docs</h1>")
    }

    /// Write `contents` at `relative`, creating parent directories.
    pub fn file(self, relative: &str, contents: &str) -> Self {
        let path = self.temp_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, contents).expect("Failed to write file");
        self
    }

    pub fn dir(self, relative: &str) -> Self {
        fs::create_dir_all(self.temp_dir.path().join(relative)).expect("Failed to create dir");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path_buf(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }
}
