//! Release artifact download.
//!
//! The actual transfer is delegated to an external client (`curl` or
//! `wget`), which is also responsible for TLS verification. Downloads are
//! not retried: a failed fetch aborts the run and the user re-invokes the
//! installer once the underlying problem is fixed.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use super::cleanup::TempResources;
use super::place::set_executable;
use super::tools::{Downloader, run_tool};

/// Suffix of the temporary download file.
const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// `curl`, following redirects and failing on HTTP errors.
#[derive(Debug, Clone)]
pub struct Curl {
    program: PathBuf,
}

impl Curl {
    #[must_use]
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Downloader for Curl {
    fn name(&self) -> &'static str {
        "curl"
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .args(["--fail", "--silent", "--show-error", "--location", "--output"])
            .arg(dest)
            .arg(url);
        run_tool(&mut command, self.name())
    }
}

/// `wget`, writing to an explicit output document.
#[derive(Debug, Clone)]
pub struct Wget {
    program: PathBuf,
}

impl Wget {
    #[must_use]
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Downloader for Wget {
    fn name(&self) -> &'static str {
        "wget"
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.arg("--quiet").arg("-O").arg(dest).arg(url);
        run_tool(&mut command, self.name())
    }
}

/// Downloads `url` into a fresh temporary file and returns its path.
///
/// The temporary file is created (and registered for cleanup) before the
/// download tool runs, so concurrent installer runs never share a file. On
/// success the file is made executable (`0755`).
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, the tool fails,
/// or the permissions cannot be set.
pub fn fetch(url: &str, downloader: &dyn Downloader, resources: &TempResources) -> Result<PathBuf> {
    let dest = resources.create_file(ARCHIVE_SUFFIX)?;

    tracing::debug!(tool = downloader.name(), url, dest = %dest.display(), "fetching artifact");
    downloader
        .download(url, &dest)
        .with_context(|| format!("Failed to fetch {url} with {}", downloader.name()))?;

    set_executable(&dest)?;
    Ok(dest)
}
