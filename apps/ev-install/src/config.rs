//! Installer configuration.
//!
//! All environment overrides are read exactly once, when [`Config`] is
//! built at startup. Every component receives the configuration by reference
//! and never consults the process environment itself.
//!
//! ## Environment Variables
//!
//! - `INSTALL_DIR`: directory the `ev` binary is installed into
//! - `INSTALL_PATH`: full path of the installed binary
//! - `CLI_FORCE_INSTALL`: reinstall even when `ev` is already present
//! - `CLI_TMPDIR`: root for temporary downloads and extraction
//! - `CLI_DOWNLOAD_HOST`: artifact host (e.g. a mirror or `file://` fixture)
//! - `CLI_VERSION`: release to install instead of the built-in default

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;

use crate::errors::InstallerError;

/// Environment variable overriding the install directory.
pub const INSTALL_DIR_ENV: &str = "INSTALL_DIR";

/// Environment variable overriding the full install path.
pub const INSTALL_PATH_ENV: &str = "INSTALL_PATH";

/// Environment variable whose presence forces a reinstall.
pub const FORCE_INSTALL_ENV: &str = "CLI_FORCE_INSTALL";

/// Environment variable overriding the temporary-directory root.
pub const TMPDIR_ENV: &str = "CLI_TMPDIR";

/// Environment variable overriding the artifact host.
pub const DOWNLOAD_HOST_ENV: &str = "CLI_DOWNLOAD_HOST";

/// Environment variable overriding the release version.
pub const VERSION_ENV: &str = "CLI_VERSION";

/// Name of the installed executable, without platform suffix.
pub const BINARY_NAME: &str = "ev";

/// Release installed when `CLI_VERSION` is not set.
pub const DEFAULT_RELEASE_VERSION: &str = env!("EV_INSTALL_RELEASE_VERSION");

/// Artifact host used when `CLI_DOWNLOAD_HOST` is not set.
pub const DEFAULT_DOWNLOAD_HOST: &str = env!("EV_INSTALL_DOWNLOAD_HOST");

/// Raw facts about the host, gathered once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProbe {
    /// OS name as reported by the host (`linux`, `Darwin`, `MINGW64_NT-10.0`, ...).
    pub os: String,
    /// Machine architecture as reported by the host (`x86_64`, `arm64`, ...).
    pub arch: String,
    /// Home directory of the invoking user, if known.
    pub home_dir: Option<PathBuf>,
}

impl HostProbe {
    /// Probes the running host.
    #[must_use]
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            home_dir: dirs::home_dir(),
        }
    }
}

/// Options that arrive on the command line rather than the environment.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    /// Onboarding/session token, carried for the installed CLI.
    pub token: Option<String>,
    /// `--force` was passed.
    pub force: bool,
}

/// Immutable installer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Executable name without platform suffix.
    pub binary_name: String,
    /// Release to install.
    pub version: semver::Version,
    /// Artifact host, without a trailing slash.
    pub download_host: String,
    /// `INSTALL_DIR` override.
    pub install_dir: Option<PathBuf>,
    /// `INSTALL_PATH` override.
    pub install_path: Option<PathBuf>,
    /// Reinstall even when the executable already exists.
    pub force: bool,
    /// Directory temporary resources are created in.
    pub temp_root: PathBuf,
    /// Search path used to probe for external tools.
    pub search_path: Option<OsString>,
    /// Raw host facts.
    pub host: HostProbe,
    /// Onboarding token passed on the command line.
    pub token: Option<String>,
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfiguration`] if `CLI_VERSION` is not
    /// a valid semantic version.
    pub fn from_env(cli: CliOptions) -> Result<Self> {
        Self::from_lookup(|key| std::env::var_os(key), HostProbe::current(), cli)
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// `PATH` is read through the same lookup and used as the tool search path.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfiguration`] if `CLI_VERSION` is not
    /// a valid semantic version.
    pub fn from_lookup<F>(lookup: F, host: HostProbe, cli: CliOptions) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let version_str = non_empty(VERSION_ENV)
            .map(|v| v.to_string_lossy().trim().to_string())
            .unwrap_or_else(|| DEFAULT_RELEASE_VERSION.to_string());
        let version_str = version_str.strip_prefix('v').unwrap_or(&version_str);
        let version = semver::Version::parse(version_str).map_err(|e| {
            InstallerError::invalid_configuration(format!(
                "{VERSION_ENV} '{version_str}' is not a valid version: {e}"
            ))
        })?;

        let download_host = non_empty(DOWNLOAD_HOST_ENV)
            .map_or_else(
                || DEFAULT_DOWNLOAD_HOST.to_string(),
                |h| h.to_string_lossy().into_owned(),
            )
            .trim_end_matches('/')
            .to_string();

        let temp_root = non_empty(TMPDIR_ENV).map_or_else(std::env::temp_dir, PathBuf::from);

        Ok(Self {
            binary_name: BINARY_NAME.to_string(),
            version,
            download_host,
            install_dir: non_empty(INSTALL_DIR_ENV).map(PathBuf::from),
            install_path: non_empty(INSTALL_PATH_ENV).map(PathBuf::from),
            force: cli.force || lookup(FORCE_INSTALL_ENV).is_some(),
            temp_root,
            search_path: lookup("PATH"),
            host,
            token: cli.token,
        })
    }
}
