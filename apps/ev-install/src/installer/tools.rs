//! External tool detection.
//!
//! Downloading and unpacking are delegated to whichever external programs
//! the host has. Each staged operation has a fixed preference order:
//!
//! - download: `curl`, then `wget`
//! - archive: `tar`, then 7-Zip (`7z`, `7zz` or `7za`)
//!
//! [`ToolRegistry::probe`] looks every candidate up on the search path once,
//! at startup. Selection afterwards is a pure lookup.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result, bail};

use super::archive::{SevenZip, Tar};
use super::download::{Curl, Wget};
use crate::errors::{InstallerError, ToolCategory};

/// A strategy for fetching a URL into a local file.
pub trait Downloader: Send + Sync {
    /// Short tool name for messages.
    fn name(&self) -> &'static str;

    /// Downloads `url` into the existing file at `dest`, overwriting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be started or reports failure.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// A strategy for unpacking a `.tar.gz` archive into a directory.
///
/// Every implementation must produce the same layout under `dest`.
pub trait Extractor: Send + Sync {
    /// Short tool name for messages.
    fn name(&self) -> &'static str;

    /// Unpacks `archive` into the existing directory `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be started or reports failure.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Download tools in preference order.
pub const DOWNLOAD_TOOLS: &[&str] = &["curl", "wget"];

/// Archive tools in preference order.
pub const ARCHIVE_TOOLS: &[&str] = &["tar", "7z"];

/// Executable names that provide 7-Zip.
const SEVEN_ZIP_BINARIES: &[&str] = &["7z", "7zz", "7za"];

/// Available tools, in preference order per category.
pub struct ToolRegistry {
    downloaders: Vec<Box<dyn Downloader>>,
    extractors: Vec<Box<dyn Extractor>>,
}

impl ToolRegistry {
    /// Probes `search_path` (a `PATH`-style list) for every known tool.
    #[must_use]
    pub fn probe(search_path: Option<&OsStr>) -> Self {
        let find = |names: &[&str]| names.iter().find_map(|name| locate(name, search_path));

        let mut downloaders: Vec<Box<dyn Downloader>> = Vec::new();
        if let Some(program) = find(&["curl"]) {
            downloaders.push(Box::new(Curl::new(program)));
        }
        if let Some(program) = find(&["wget"]) {
            downloaders.push(Box::new(Wget::new(program)));
        }

        let mut extractors: Vec<Box<dyn Extractor>> = Vec::new();
        if let Some(program) = find(&["tar"]) {
            extractors.push(Box::new(Tar::new(program)));
        }
        if let Some(program) = find(SEVEN_ZIP_BINARIES) {
            extractors.push(Box::new(SevenZip::new(program)));
        }

        let registry = Self::from_parts(downloaders, extractors);
        tracing::debug!(
            download = ?registry.select(ToolCategory::Download),
            archive = ?registry.select(ToolCategory::Archive),
            "probed external tools"
        );
        registry
    }

    /// Builds a registry from explicit strategies, already in preference order.
    #[must_use]
    pub fn from_parts(
        downloaders: Vec<Box<dyn Downloader>>,
        extractors: Vec<Box<dyn Extractor>>,
    ) -> Self {
        Self {
            downloaders,
            extractors,
        }
    }

    /// Returns the name of the preferred available tool for `category`.
    #[must_use]
    pub fn select(&self, category: ToolCategory) -> Option<&'static str> {
        match category {
            ToolCategory::Download => self.downloaders.first().map(|d| d.name()),
            ToolCategory::Archive => self.extractors.first().map(|e| e.name()),
        }
    }

    /// Returns the preferred downloader.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ToolUnavailable`] if no download tool was found.
    pub fn downloader(&self) -> Result<&dyn Downloader, InstallerError> {
        self.downloaders
            .first()
            .map(|tool| &**tool)
            .ok_or_else(|| InstallerError::tool_unavailable(ToolCategory::Download, DOWNLOAD_TOOLS))
    }

    /// Returns the preferred extractor.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ToolUnavailable`] if no archive tool was found.
    pub fn extractor(&self) -> Result<&dyn Extractor, InstallerError> {
        self.extractors
            .first()
            .map(|tool| &**tool)
            .ok_or_else(|| InstallerError::tool_unavailable(ToolCategory::Archive, ARCHIVE_TOOLS))
    }
}

/// Looks `name` up on `search_path`.
pub fn locate(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    which::which_in(name, search_path, cwd).ok()
}

/// Runs a prepared tool command to completion and checks its exit status.
///
/// Standard streams are inherited so the tool's own diagnostics reach the user.
pub(crate) fn run_tool(command: &mut Command, tool: &str) -> Result<()> {
    tracing::debug!(?command, "running {tool}");
    let status = command
        .status()
        .with_context(|| format!("Failed to run {tool}"))?;
    check_status(status, tool)
}

/// Fails if `status` is not a success.
pub(crate) fn check_status(status: ExitStatus, tool: &str) -> Result<()> {
    if !status.success() {
        match status.code() {
            Some(code) => bail!("{tool} exited with status {code}"),
            None => bail!("{tool} was terminated by a signal"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedDownloader(&'static str);

    impl Downloader for NamedDownloader {
        fn name(&self) -> &'static str {
            self.0
        }

        fn download(&self, _url: &str, _dest: &Path) -> Result<()> {
            Ok(())
        }
    }

    struct NamedExtractor(&'static str);

    impl Extractor for NamedExtractor {
        fn name(&self) -> &'static str {
            self.0
        }

        fn extract(&self, _archive: &Path, _dest: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn select_returns_first_in_priority_order() {
        let registry = ToolRegistry::from_parts(
            vec![Box::new(NamedDownloader("curl")), Box::new(NamedDownloader("wget"))],
            vec![Box::new(NamedExtractor("tar")), Box::new(NamedExtractor("7z"))],
        );
        assert_eq!(registry.select(ToolCategory::Download), Some("curl"));
        assert_eq!(registry.select(ToolCategory::Archive), Some("tar"));
        assert_eq!(registry.downloader().unwrap().name(), "curl");
        assert_eq!(registry.extractor().unwrap().name(), "tar");
    }

    #[test]
    fn empty_registry_reports_tool_unavailable() {
        let registry = ToolRegistry::from_parts(Vec::new(), Vec::new());
        assert_eq!(registry.select(ToolCategory::Download), None);
        assert_eq!(registry.select(ToolCategory::Archive), None);

        let err = registry.downloader().err().expect("no downloader");
        assert!(matches!(
            err,
            InstallerError::ToolUnavailable {
                category: ToolCategory::Download,
                ..
            }
        ));
        assert!(err.to_string().contains("curl, wget"));

        let err = registry.extractor().err().expect("no extractor");
        assert!(matches!(
            err,
            InstallerError::ToolUnavailable {
                category: ToolCategory::Archive,
                ..
            }
        ));
    }

    #[test]
    fn probe_on_empty_search_path_finds_nothing() {
        let empty = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::probe(Some(empty.path().as_os_str()));
        assert_eq!(registry.select(ToolCategory::Download), None);
        assert_eq!(registry.select(ToolCategory::Archive), None);
    }

    #[cfg(unix)]
    #[test]
    fn probe_prefers_curl_over_wget() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        for name in ["wget", "curl", "7zz"] {
            let path = bin.path().join(name);
            std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let registry = ToolRegistry::probe(Some(bin.path().as_os_str()));
        assert_eq!(registry.select(ToolCategory::Download), Some("curl"));
        assert_eq!(registry.select(ToolCategory::Archive), Some("7z"));
    }

    #[cfg(unix)]
    #[test]
    fn run_tool_reports_non_zero_exit() {
        let mut command = Command::new("sh");
        command.args(["-c", "exit 7"]);
        let err = run_tool(&mut command, "sh").unwrap_err();
        assert_eq!(err.to_string(), "sh exited with status 7");
    }

    #[test]
    fn run_tool_reports_missing_program() {
        let mut command = Command::new("ev-install-definitely-missing-tool");
        let err = run_tool(&mut command, "missing").unwrap_err();
        assert!(err.to_string().contains("Failed to run missing"));
    }
}
