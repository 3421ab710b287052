//! Install location and the idempotency decision.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::platform::PlatformProfile;
use crate::config::Config;
use crate::errors::InstallerError;

/// Default install directory on Unix-like hosts.
pub const UNIX_INSTALL_DIR: &str = "/usr/local/bin";

/// Where the executable ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    /// Directory that must exist before the executable is moved in.
    pub directory: PathBuf,
    /// Final path of the executable.
    pub executable_path: PathBuf,
}

impl InstallTarget {
    /// Resolves the install location from overrides and platform defaults.
    ///
    /// Priority:
    /// 1. `INSTALL_PATH`; the directory is its parent
    /// 2. `INSTALL_DIR` joined with the platform executable name
    /// 3. `/usr/local/bin` on Unix, `<home>/bin` on Windows
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfiguration`] if no default directory
    /// can be determined.
    pub fn resolve(config: &Config, profile: &PlatformProfile) -> Result<Self> {
        let executable_name = profile.executable_name(&config.binary_name);

        if let Some(path) = &config.install_path {
            let directory = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            return Ok(Self {
                directory,
                executable_path: path.clone(),
            });
        }

        let directory = match &config.install_dir {
            Some(dir) => dir.clone(),
            None if profile.is_windows() => config
                .host
                .home_dir
                .as_ref()
                .map(|home| home.join("bin"))
                .ok_or_else(|| {
                    InstallerError::invalid_configuration(
                        "cannot determine the home directory; set INSTALL_DIR",
                    )
                })?,
            None => PathBuf::from(UNIX_INSTALL_DIR),
        };

        Ok(Self {
            executable_path: directory.join(executable_name),
            directory,
        })
    }
}

/// What to do about an existing installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallDecision {
    /// An executable is already present and no force flag was given.
    AlreadyInstalled,
    /// An executable is present but will be replaced.
    ForceReinstall,
    /// Nothing is installed yet.
    FreshInstall,
}

impl InstallDecision {
    /// Decides based on what is at the target path and the force flag.
    ///
    /// Only a file counts as an installation. Anything else at the path
    /// (a directory, say) is left for the install step to fail on.
    #[must_use]
    pub fn evaluate(target: &InstallTarget, force: bool) -> Self {
        match (target.executable_path.is_file(), force) {
            (true, false) => Self::AlreadyInstalled,
            (true, true) => Self::ForceReinstall,
            (false, _) => Self::FreshInstall,
        }
    }
}
