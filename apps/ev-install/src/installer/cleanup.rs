//! Temporary resource tracking and guaranteed cleanup.
//!
//! Every temporary path an installer run creates goes through
//! [`TempResources`], which records it before handing it out. Removal happens
//! exactly once, from whichever comes first:
//!
//! - the [`CleanupGuard`] being dropped at the end of the run (success or error)
//! - an explicit [`TempResources::release`] from the interrupt handler
//!
//! After release no further temporary paths can be created, so nothing
//! escapes cleanup if the pipeline is still running when an interrupt lands.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, bail};

/// Prefix shared by every temporary file and directory the installer creates.
pub const TEMP_PREFIX: &str = "ev-install.";

#[derive(Debug, Default)]
struct Registry {
    paths: Vec<PathBuf>,
    released: bool,
}

/// Shared registry of the temporary paths created during a run.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone)]
pub struct TempResources {
    root: PathBuf,
    registry: Arc<Mutex<Registry>>,
}

impl TempResources {
    /// Creates an empty registry that places temporaries under `root`.
    ///
    /// Nothing is touched on disk until a temporary is requested.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Directory temporaries are created in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a uniquely named empty file and registers it for removal.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup already ran or the file cannot be created.
    pub fn create_file(&self, suffix: &str) -> Result<PathBuf> {
        let mut registry = self.lock();
        if registry.released {
            bail!("Temporary resources were already released");
        }

        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.root)
            .with_context(|| {
                format!("Failed to create temporary file in {}", self.root.display())
            })?;
        let (_, path) = file
            .keep()
            .with_context(|| "Failed to persist temporary file")?;

        tracing::debug!(path = %path.display(), "registered temporary file");
        registry.paths.push(path.clone());
        Ok(path)
    }

    /// Creates a uniquely named empty directory and registers it for removal.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup already ran or the directory cannot be created.
    pub fn create_dir(&self) -> Result<PathBuf> {
        let mut registry = self.lock();
        if registry.released {
            bail!("Temporary resources were already released");
        }

        let path = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&self.root)
            .with_context(|| {
                format!(
                    "Failed to create temporary directory in {}",
                    self.root.display()
                )
            })?
            .keep();

        tracing::debug!(path = %path.display(), "registered temporary directory");
        registry.paths.push(path.clone());
        Ok(path)
    }

    /// Returns the currently registered paths.
    #[cfg(test)]
    #[must_use]
    pub fn registered(&self) -> Vec<PathBuf> {
        self.lock().paths.clone()
    }

    /// Activates the exit guard for this registry.
    #[must_use = "cleanup runs when the guard is dropped"]
    pub fn guard(&self) -> CleanupGuard {
        CleanupGuard {
            resources: self.clone(),
        }
    }

    /// Removes every registered path and closes the registry.
    ///
    /// Best effort and idempotent: paths that are already gone are skipped and
    /// a second call does nothing. Returns the number of paths removed.
    pub fn release(&self) -> usize {
        let paths = {
            let mut registry = self.lock();
            registry.released = true;
            std::mem::take(&mut registry.paths)
        };

        let mut removed = 0;
        for path in paths {
            match remove_path(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary path");
                }
            }
        }
        removed
    }
}

/// Removes a file or directory tree. Returns `false` if it did not exist.
fn remove_path(path: &Path) -> io::Result<bool> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Releases the temporary resources of a run when dropped.
#[derive(Debug)]
pub struct CleanupGuard {
    resources: TempResources,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let removed = self.resources.release();
        tracing::debug!(removed, "cleanup guard released temporary resources");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leftovers(root: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(root)
            .expect("Should read temp root")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .map(|e| e.path())
            .collect()
    }

    #[test]
    fn created_paths_use_prefix_and_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let resources = TempResources::new(root.path());

        let a = resources.create_file(".tar.gz").unwrap();
        let b = resources.create_file(".tar.gz").unwrap();
        let dir = resources.create_dir().unwrap();

        assert_ne!(a, b);
        assert!(a.is_file());
        assert!(dir.is_dir());
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_PREFIX));
        assert!(name.ends_with(".tar.gz"));
        assert_eq!(resources.registered().len(), 3);

        resources.release();
    }

    #[test]
    fn guard_drop_removes_files_and_populated_directories() {
        let root = tempfile::tempdir().unwrap();
        let resources = TempResources::new(root.path());

        {
            let _guard = resources.guard();
            let file = resources.create_file("").unwrap();
            std::fs::write(&file, b"payload").unwrap();
            let dir = resources.create_dir().unwrap();
            std::fs::create_dir_all(dir.join("bin")).unwrap();
            std::fs::write(dir.join("bin").join("ev"), b"binary").unwrap();
            assert_eq!(leftovers(root.path()).len(), 2);
        }

        assert!(leftovers(root.path()).is_empty());
        assert!(resources.registered().is_empty());
    }

    #[test]
    fn release_is_idempotent_and_tolerates_missing_paths() {
        let root = tempfile::tempdir().unwrap();
        let resources = TempResources::new(root.path());

        let file = resources.create_file("").unwrap();
        let dir = resources.create_dir().unwrap();
        std::fs::remove_file(&file).unwrap();

        assert_eq!(resources.release(), 1);
        assert!(!dir.exists());
        assert_eq!(resources.release(), 0);
    }

    #[test]
    fn creation_is_refused_after_release() {
        let root = tempfile::tempdir().unwrap();
        let resources = TempResources::new(root.path());
        let handle = resources.clone();

        handle.release();

        assert!(resources.create_file("").is_err());
        assert!(resources.create_dir().is_err());
        assert!(leftovers(root.path()).is_empty());
    }

    #[test]
    fn guard_without_registrations_is_a_no_op() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("unrelated"), b"keep me").unwrap();
        let resources = TempResources::new(root.path());

        drop(resources.guard());

        assert!(root.path().join("unrelated").exists());
    }

    #[test]
    fn missing_root_reports_error() {
        let root = tempfile::tempdir().unwrap();
        let resources = TempResources::new(root.path().join("does-not-exist"));

        let err = resources.create_file("").unwrap_err();
        assert!(err.to_string().contains("Failed to create temporary file"));
        assert!(resources.registered().is_empty());
    }
}
