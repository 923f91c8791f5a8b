use anyhow::{Context, Result};
use ctx_store::{Config, ContextStore, WriteConfig};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// An isolated store root in a temp directory
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create an empty workspace
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        Ok(Self { dir })
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Initialize a store root with a no-retry write policy so injected
    /// failures surface immediately.
    pub fn init_store(&self) -> Result<ContextStore> {
        ContextStore::init(self.path())?;
        let config = Config {
            write: WriteConfig::no_retry(),
            ..Config::default()
        };
        config.save(self.path())?;
        self.open_store()
    }

    /// Open the store, as a fresh process would
    pub fn open_store(&self) -> Result<ContextStore> {
        Ok(ContextStore::open(self.path())?)
    }

    /// Write file relative to the root
    pub fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.path().join(path);

        // Create parent directories
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directories for {}", path))?;
        }

        fs::write(&full_path, content)
            .with_context(|| format!("Failed to write file: {}", path))?;

        Ok(())
    }

    /// Append raw bytes to a file, bypassing the store
    pub fn append_raw(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.path().join(path))
            .with_context(|| format!("Failed to open for append: {}", path))?;
        file.write_all(content)?;
        Ok(())
    }

    /// Read file relative to the root
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.path().join(path);
        fs::read(&full_path).with_context(|| format!("Failed to read file: {}", path))
    }

    /// Remove a file if it exists
    pub fn remove_file(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.path().join(path)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("Failed to remove file: {}", path))
            }
            _ => Ok(()),
        }
    }

    /// Check if file exists
    pub fn file_exists(&self, path: &str) -> bool {
        self.path().join(path).exists()
    }
}
