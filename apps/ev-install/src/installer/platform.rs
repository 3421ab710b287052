//! Platform resolution for the ev installer.
//!
//! Maps raw host probes (an OS name and a machine architecture) to the
//! canonical pair used to pick a release artifact.
//!
//! ## Supported Platforms
//!
//! - Linux `x86_64` (`x86_64-unknown-linux-musl`)
//! - Linux `aarch64` (`aarch64-unknown-linux-musl`)
//! - macOS, any architecture (`universal-apple-darwin`)
//! - Windows `x86_64` (`x86_64-pc-windows-msvc`)

use std::fmt;

use crate::config::Config;

/// Architecture marker used for every macOS host.
///
/// A single universal binary is published for all Mac architectures.
pub const UNIVERSAL_ARCH: &str = "universal";

/// Canonical operating system families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Any Linux distribution.
    Linux,
    /// macOS.
    Darwin,
    /// Native Windows and its POSIX emulation layers.
    Windows,
    /// Anything the installer does not recognise.
    Unknown,
}

impl Os {
    /// Normalizes an OS name from `uname -s` or `std::env::consts::OS`.
    ///
    /// POSIX emulation layers on Windows (`MINGW*`, `MSYS*`, `CYGWIN*`) all
    /// map to [`Os::Windows`].
    #[must_use]
    pub fn from_probe(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        match lower.as_str() {
            "linux" => Self::Linux,
            "darwin" | "macos" => Self::Darwin,
            "windows" | "windows_nt" => Self::Windows,
            _ if lower.starts_with("mingw")
                || lower.starts_with("msys")
                || lower.starts_with("cygwin") =>
            {
                Self::Windows
            }
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published artifacts, keyed by `(os, arch)`.
const TARGETS: &[(Os, &str, &str)] = &[
    (Os::Linux, "x86_64", "x86_64-unknown-linux-musl"),
    (Os::Linux, "aarch64", "aarch64-unknown-linux-musl"),
    (Os::Darwin, UNIVERSAL_ARCH, "universal-apple-darwin"),
    (Os::Windows, "x86_64", "x86_64-pc-windows-msvc"),
];

/// Normalizes common architecture aliases.
fn normalize_arch(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    match lower.as_str() {
        "amd64" | "x64" => "x86_64".to_string(),
        "arm64" | "armv8" => "aarch64".to_string(),
        _ => lower,
    }
}

/// The resolved host platform.
///
/// Built once at startup and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Canonical OS family.
    pub os: Os,
    /// Canonical architecture (`universal` on macOS).
    pub arch: String,
    /// Whether a release artifact exists for this platform.
    pub supported: bool,
    /// The OS string exactly as probed, for diagnostics.
    pub raw_os: String,
    triple: Option<&'static str>,
}

impl PlatformProfile {
    /// Resolves raw host probes into a profile.
    ///
    /// Never fails: platforms without an artifact come back with
    /// `supported == false`.
    #[must_use]
    pub fn resolve(raw_os: &str, raw_arch: &str) -> Self {
        let os = Os::from_probe(raw_os);
        let arch = if os == Os::Darwin {
            UNIVERSAL_ARCH.to_string()
        } else {
            normalize_arch(raw_arch)
        };

        let triple = TARGETS
            .iter()
            .find(|(target_os, target_arch, _)| *target_os == os && *target_arch == arch)
            .map(|(_, _, triple)| *triple);

        tracing::debug!(%os, %arch, ?triple, "resolved platform");

        Self {
            os,
            arch,
            supported: triple.is_some(),
            raw_os: raw_os.to_string(),
            triple,
        }
    }

    /// Returns the target triple of the published artifact.
    #[must_use]
    pub fn target_triple(&self) -> Option<&'static str> {
        self.triple
    }

    /// Returns the executable file extension for this platform.
    ///
    /// Returns `.exe` on Windows, empty string elsewhere.
    #[must_use]
    pub fn executable_extension(&self) -> &'static str {
        match self.os {
            Os::Windows => ".exe",
            Os::Linux | Os::Darwin | Os::Unknown => "",
        }
    }

    /// Returns `name` with the platform's executable extension appended.
    #[must_use]
    pub fn executable_name(&self, name: &str) -> String {
        format!("{name}{}", self.executable_extension())
    }

    /// Returns whether this platform is Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Builds the download target for the configured release.
    ///
    /// Returns `None` on unsupported platforms.
    #[must_use]
    pub fn download_target(&self, config: &Config) -> Option<DownloadTarget> {
        let triple = self.triple?;
        Some(DownloadTarget {
            url: format!(
                "{host}/cli/{major}/{version}/{triple}/{artifact}.tar.gz",
                host = config.download_host,
                major = config.version.major,
                version = config.version,
                artifact = config.binary_name,
            ),
        })
    }
}

impl fmt::Display for PlatformProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Where the release archive is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Full URL of the release archive.
    pub url: String,
}
