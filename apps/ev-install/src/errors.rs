//! Error types for the ev installer.
//!
//! Every stage of the installer reports failure through `anyhow::Result`.
//! At the stage boundary the failure is wrapped in an [`InstallerError`],
//! which names the stage and carries the exit status the process ends with.

use std::fmt;
use thiserror::Error;

/// Exit status for an unsupported host platform.
pub const EXIT_UNSUPPORTED_PLATFORM: i32 = 2;

/// Exit status when neither `curl` nor `wget` is available.
pub const EXIT_NO_DOWNLOAD_TOOL: i32 = 3;

/// Exit status for every other failure.
pub const EXIT_FAILURE: i32 = 1;

/// Exit status after an interrupt (Ctrl-C, `SIGINT`).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit status after `SIGTERM`.
pub const EXIT_TERMINATED: i32 = 143;

/// Exit status after `SIGHUP`.
pub const EXIT_HANGUP: i32 = 129;

/// Category of interchangeable external tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    /// HTTP download clients.
    Download,
    /// Archive unpacking tools.
    Archive,
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Archive => write!(f, "archive extraction"),
        }
    }
}

/// Terminal failures of an installer run.
///
/// None of these are retried. The user is expected to fix the underlying
/// condition (install `curl`, fix permissions, ...) and run the installer again.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The host OS/architecture has no published artifact.
    #[error("unsupported platform: {os} on {arch}")]
    UnsupportedPlatform {
        /// The OS as reported by the host.
        os: String,
        /// The architecture as reported by the host.
        arch: String,
    },

    /// No tool of the given category was found.
    #[error("no usable {category} tool found (tried: {tried})")]
    ToolUnavailable {
        /// The stage that needed the tool.
        category: ToolCategory,
        /// Comma-separated names of the tools that were probed.
        tried: String,
    },

    /// Downloading the release archive failed.
    #[error("download failed: {message}")]
    FetchFailed {
        /// Description of the failure.
        message: String,
    },

    /// Unpacking the release archive failed.
    #[error("extraction failed: {message}")]
    ExtractFailed {
        /// Description of the failure.
        message: String,
    },

    /// Placing the executable at the install path failed.
    #[error("installation failed: {message}")]
    InstallFailed {
        /// Description of the failure.
        message: String,
    },

    /// An environment override or command-line value is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of what was invalid.
        message: String,
    },

    /// The run was stopped by a termination signal.
    #[error("interrupted")]
    Interrupted {
        /// Exit status for the signal (`128 + signal number`).
        status: i32,
    },
}

impl InstallerError {
    /// Creates a new `UnsupportedPlatform` error.
    #[must_use]
    pub fn unsupported_platform(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Creates a new `ToolUnavailable` error.
    #[must_use]
    pub fn tool_unavailable(category: ToolCategory, tried: &[&str]) -> Self {
        Self::ToolUnavailable {
            category,
            tried: tried.join(", "),
        }
    }

    /// Creates a new `FetchFailed` error, flattening the cause chain to one line.
    #[must_use]
    pub fn fetch_failed(cause: &anyhow::Error) -> Self {
        Self::FetchFailed {
            message: format!("{cause:#}"),
        }
    }

    /// Creates a new `ExtractFailed` error, flattening the cause chain to one line.
    #[must_use]
    pub fn extract_failed(cause: &anyhow::Error) -> Self {
        Self::ExtractFailed {
            message: format!("{cause:#}"),
        }
    }

    /// Creates a new `InstallFailed` error.
    #[must_use]
    pub fn install_failed(message: impl Into<String>) -> Self {
        Self::InstallFailed {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidConfiguration` error.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Creates a new `Interrupted` error carrying the signal's exit status.
    #[must_use]
    pub fn interrupted(status: i32) -> Self {
        Self::Interrupted { status }
    }

    /// Returns the process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedPlatform { .. } => EXIT_UNSUPPORTED_PLATFORM,
            Self::ToolUnavailable {
                category: ToolCategory::Download,
                ..
            } => EXIT_NO_DOWNLOAD_TOOL,
            Self::ToolUnavailable { .. }
            | Self::FetchFailed { .. }
            | Self::ExtractFailed { .. }
            | Self::InstallFailed { .. }
            | Self::InvalidConfiguration { .. } => EXIT_FAILURE,
            Self::Interrupted { status } => *status,
        }
    }
}
