//! Placing the extracted executable at its install path.
//!
//! Filesystem changes at the install location are attempted unprivileged
//! first. Only when that fails is the same operation retried, exactly once,
//! through an [`Escalation`] strategy (normally `sudo`). Users with a
//! writable install directory are never prompted for a password.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

use super::platform::PlatformProfile;
use super::target::InstallTarget;
use super::tools::{locate, run_tool};

/// Privileged filesystem operations.
pub trait Escalation: Send + Sync {
    /// Short name for messages.
    fn name(&self) -> &'static str;

    /// Creates `dir` and any missing parents with elevated privileges.
    ///
    /// # Errors
    ///
    /// Returns an error if elevation is unavailable or the operation fails.
    fn create_dir_all(&self, dir: &Path) -> Result<()>;

    /// Moves `from` to `to` with elevated privileges, replacing `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if elevation is unavailable or the operation fails.
    fn move_file(&self, from: &Path, to: &Path) -> Result<()>;
}

/// Elevation through `sudo`.
#[derive(Debug, Clone)]
pub struct Sudo {
    program: PathBuf,
}

impl Sudo {
    #[must_use]
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Escalation for Sudo {
    fn name(&self) -> &'static str {
        "sudo"
    }

    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(["mkdir", "-p", "--"]).arg(dir);
        run_tool(&mut command, "sudo mkdir")
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(["mv", "-f", "--"]).arg(from).arg(to);
        run_tool(&mut command, "sudo mv")
    }
}

/// Used when the host offers no way to elevate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEscalation;

impl Escalation for NoEscalation {
    fn name(&self) -> &'static str {
        "none"
    }

    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        bail!(
            "elevated privileges are unavailable to create {}",
            dir.display()
        )
    }

    fn move_file(&self, _from: &Path, to: &Path) -> Result<()> {
        bail!(
            "elevated privileges are unavailable to write {}",
            to.display()
        )
    }
}

/// Picks the escalation strategy for this host.
///
/// Windows has no non-interactive elevation; elsewhere `sudo` is used when it
/// is on the search path.
#[must_use]
pub fn escalation_for(
    profile: &PlatformProfile,
    search_path: Option<&OsStr>,
) -> Box<dyn Escalation> {
    if profile.is_windows() {
        return Box::new(NoEscalation);
    }
    match locate("sudo", search_path) {
        Some(program) => Box::new(Sudo::new(program)),
        None => Box::new(NoEscalation),
    }
}

/// Sets the executable permission bits (`0755`) on a file (Unix only).
///
/// # Errors
///
/// Returns an error if the metadata cannot be read or the permissions set.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .with_context(|| format!("Failed to get metadata: {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
        .with_context(|| format!("Failed to set permissions: {}", path.display()))
}

/// Sets executable permissions (no-op on Windows).
#[cfg(windows)]
#[allow(clippy::unnecessary_wraps)]
pub fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Moves a file, copying across filesystem boundaries.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            std::fs::copy(from, to)?;
            // The source lives in a temporary directory that cleanup removes.
            let _ = std::fs::remove_file(from);
            Ok(())
        }
        result => result,
    }
}

/// Ensures the install directory exists.
fn ensure_directory(dir: &Path, escalation: &dyn Escalation) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let Err(plain) = std::fs::create_dir_all(dir) else {
        return Ok(());
    };

    tracing::debug!(dir = %dir.display(), error = %plain, "unprivileged mkdir failed");
    println!(
        "Creating {} requires elevated privileges, retrying with {}...",
        dir.display(),
        escalation.name()
    );
    escalation.create_dir_all(dir).with_context(|| {
        format!(
            "Failed to create install directory {} ({plain})",
            dir.display()
        )
    })
}

/// Installs the executable unpacked in `extraction_dir` at `target`.
///
/// The archive must hold the executable at `bin/<name>` (`bin/<name>.exe` on
/// Windows).
///
/// # Errors
///
/// Returns an error if the executable is missing from the archive, its
/// permissions cannot be set, or the directory creation or move fails both
/// unprivileged and elevated.
pub fn install(
    extraction_dir: &Path,
    profile: &PlatformProfile,
    binary_name: &str,
    target: &InstallTarget,
    escalation: &dyn Escalation,
) -> Result<()> {
    let relative = Path::new("bin").join(profile.executable_name(binary_name));
    let source = extraction_dir.join(&relative);
    if !source.is_file() {
        bail!(
            "release archive does not contain {}",
            relative.display()
        );
    }

    set_executable(&source)?;
    ensure_directory(&target.directory, escalation)?;

    let destination = &target.executable_path;
    let Err(plain) = move_file(&source, destination) else {
        return Ok(());
    };

    tracing::debug!(to = %destination.display(), error = %plain, "unprivileged move failed");
    println!(
        "Writing {} requires elevated privileges, retrying with {}...",
        destination.display(),
        escalation.name()
    );
    escalation.move_file(&source, destination).with_context(|| {
        format!(
            "Failed to move executable to {} ({plain})",
            destination.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every privileged call and always fails.
    #[derive(Default)]
    struct RecordingEscalation {
        calls: Mutex<Vec<String>>,
    }

    impl Escalation for RecordingEscalation {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn create_dir_all(&self, dir: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(format!("mkdir {}", dir.display()));
            bail!("denied")
        }

        fn move_file(&self, _from: &Path, to: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(format!("mv {}", to.display()));
            bail!("denied")
        }
    }

    fn linux() -> PlatformProfile {
        PlatformProfile::resolve("linux", "x86_64")
    }

    fn extracted(root: &Path) -> PathBuf {
        let dir = root.join("extracted");
        std::fs::create_dir_all(dir.join("bin")).unwrap();
        std::fs::write(dir.join("bin").join("ev"), b"new binary").unwrap();
        dir
    }

    #[test]
    fn installs_into_existing_directory_without_escalation() {
        let root = tempfile::tempdir().unwrap();
        let dir = extracted(root.path());
        let install_dir = root.path().join("install");
        std::fs::create_dir(&install_dir).unwrap();
        let target = InstallTarget {
            directory: install_dir.clone(),
            executable_path: install_dir.join("ev"),
        };
        let escalation = RecordingEscalation::default();

        install(&dir, &linux(), "ev", &target, &escalation).expect("Should install");

        assert_eq!(std::fs::read(&target.executable_path).unwrap(), b"new binary");
        assert!(escalation.calls.lock().unwrap().is_empty());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&target.executable_path)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn creates_missing_install_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = extracted(root.path());
        let install_dir = root.path().join("nested").join("bin");
        let target = InstallTarget {
            directory: install_dir.clone(),
            executable_path: install_dir.join("ev"),
        };

        install(&dir, &linux(), "ev", &target, &NoEscalation).expect("Should install");

        assert!(target.executable_path.is_file());
    }

    #[test]
    fn replaces_existing_executable() {
        let root = tempfile::tempdir().unwrap();
        let dir = extracted(root.path());
        let target = InstallTarget {
            directory: root.path().to_path_buf(),
            executable_path: root.path().join("ev"),
        };
        std::fs::write(&target.executable_path, b"old binary").unwrap();

        install(&dir, &linux(), "ev", &target, &NoEscalation).expect("Should install");

        assert_eq!(std::fs::read(&target.executable_path).unwrap(), b"new binary");
    }

    #[test]
    fn failed_move_retries_elevated_exactly_once() {
        let root = tempfile::tempdir().unwrap();
        let dir = extracted(root.path());
        // A non-empty directory at the destination cannot be replaced by a
        // file, even by root.
        let blocked = root.path().join("ev");
        std::fs::create_dir_all(blocked.join("occupied")).unwrap();
        let target = InstallTarget {
            directory: root.path().to_path_buf(),
            executable_path: blocked.clone(),
        };
        let escalation = RecordingEscalation::default();

        let err = install(&dir, &linux(), "ev", &target, &escalation).unwrap_err();

        let calls = escalation.calls.lock().unwrap();
        assert_eq!(*calls, vec![format!("mv {}", blocked.display())]);
        assert!(format!("{err:#}").contains("Failed to move executable"));
    }

    #[test]
    fn failed_mkdir_retries_elevated_exactly_once() {
        let root = tempfile::tempdir().unwrap();
        let dir = extracted(root.path());
        // A regular file in the parent chain makes mkdir fail for everyone.
        let file = root.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();
        let install_dir = file.join("bin");
        let target = InstallTarget {
            directory: install_dir.clone(),
            executable_path: install_dir.join("ev"),
        };
        let escalation = RecordingEscalation::default();

        let err = install(&dir, &linux(), "ev", &target, &escalation).unwrap_err();

        let calls = escalation.calls.lock().unwrap();
        assert_eq!(*calls, vec![format!("mkdir {}", install_dir.display())]);
        assert!(format!("{err:#}").contains("Failed to create install directory"));
    }

    #[test]
    fn missing_executable_in_archive_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("extracted");
        std::fs::create_dir_all(dir.join("bin")).unwrap();
        let target = InstallTarget {
            directory: root.path().to_path_buf(),
            executable_path: root.path().join("ev"),
        };

        let err = install(&dir, &linux(), "ev", &target, &NoEscalation).unwrap_err();

        assert!(err.to_string().contains("does not contain"));
        assert!(!target.executable_path.exists());
    }

    #[test]
    fn windows_expects_exe_suffix() {
        let root = tempfile::tempdir().unwrap();
        let dir = extracted(root.path());
        let target = InstallTarget {
            directory: root.path().join("out"),
            executable_path: root.path().join("out").join("ev.exe"),
        };
        let windows = PlatformProfile::resolve("MINGW64_NT-10.0", "x86_64");

        let err = install(&dir, &windows, "ev", &target, &NoEscalation).unwrap_err();
        assert!(err.to_string().contains("ev.exe"));

        std::fs::write(dir.join("bin").join("ev.exe"), b"windows binary").unwrap();
        install(&dir, &windows, "ev", &target, &NoEscalation).expect("Should install");
        assert_eq!(
            std::fs::read(&target.executable_path).unwrap(),
            b"windows binary"
        );
    }

    #[test]
    fn no_escalation_always_fails() {
        assert!(NoEscalation.create_dir_all(Path::new("/x")).is_err());
        assert!(NoEscalation.move_file(Path::new("/a"), Path::new("/b")).is_err());
    }

    #[test]
    fn windows_never_escalates() {
        let windows = PlatformProfile::resolve("windows", "x86_64");
        assert_eq!(escalation_for(&windows, None).name(), "none");
    }
}
