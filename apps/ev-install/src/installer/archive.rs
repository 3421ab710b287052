//! Archive extraction for the ev installer.
//!
//! Release artifacts are gzip-compressed tarballs. Two interchangeable
//! strategies unpack them into the same directory layout:
//!
//! - [`Tar`]: a single `tar -xzf` invocation
//! - [`SevenZip`]: a two-stage pipe, gunzip to stdout then untar from stdin

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use super::cleanup::TempResources;
use super::tools::{Extractor, check_status, run_tool};

/// `tar` with built-in gzip support.
#[derive(Debug, Clone)]
pub struct Tar {
    program: PathBuf,
}

impl Tar {
    #[must_use]
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Extractor for Tar {
    fn name(&self) -> &'static str {
        "tar"
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.arg("-xzf").arg(archive).arg("-C").arg(dest);
        run_tool(&mut command, self.name())
    }
}

/// 7-Zip, which cannot unpack `.tar.gz` in one step.
///
/// The first process decompresses the gzip layer to stdout, the second reads
/// the tar stream from stdin.
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: PathBuf,
}

impl SevenZip {
    #[must_use]
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Extractor for SevenZip {
    fn name(&self) -> &'static str {
        "7z"
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mut decompress = Command::new(&self.program)
            .args(["x", "-so", "-tgzip"])
            .arg(archive)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.name()))?;

        let Some(gunzipped) = decompress.stdout.take() else {
            let _ = decompress.kill();
            let _ = decompress.wait();
            anyhow::bail!("{} produced no output stream", self.name());
        };

        let mut output_dir = OsString::from("-o");
        output_dir.push(dest.as_os_str());

        let unpacked = Command::new(&self.program)
            .args(["x", "-si", "-ttar", "-y"])
            .arg(output_dir)
            .stdin(Stdio::from(gunzipped))
            .stdout(Stdio::null())
            .status();

        let unpacked = match unpacked {
            Ok(status) => status,
            Err(e) => {
                let _ = decompress.kill();
                let _ = decompress.wait();
                return Err(e).with_context(|| format!("Failed to run {}", self.name()));
            }
        };

        let decompressed = decompress
            .wait()
            .with_context(|| format!("Failed to wait for {}", self.name()))?;

        check_status(decompressed, "7z (decompress)")?;
        check_status(unpacked, "7z (unpack)")
    }
}

/// Unpacks `archive` into a fresh temporary directory and returns its path.
///
/// The directory is created and registered for cleanup before the tool runs.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the tool fails.
pub fn extract(
    archive: &Path,
    extractor: &dyn Extractor,
    resources: &TempResources,
) -> Result<PathBuf> {
    let dest = resources.create_dir()?;

    tracing::debug!(
        tool = extractor.name(),
        archive = %archive.display(),
        dest = %dest.display(),
        "extracting artifact"
    );
    extractor.extract(archive, &dest).with_context(|| {
        format!(
            "Failed to extract {} with {}",
            archive.display(),
            extractor.name()
        )
    })?;

    Ok(dest)
}
