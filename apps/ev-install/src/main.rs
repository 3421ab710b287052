#![warn(clippy::pedantic)]

//! # ev installer (ev-install)
//!
//! Bootstraps the `ev` command-line tool onto a developer machine: detects
//! the host platform, downloads the matching release archive with `curl` or
//! `wget`, unpacks it with `tar` or 7-Zip and places the executable on disk,
//! escalating with `sudo` only when the install location requires it.
//!
//! Running the installer again is safe: an existing installation is left
//! untouched unless a reinstall is requested.
//!
//! ## Exit Status
//!
//! - `0` - installed, or already installed
//! - `2` - the host platform has no published build
//! - `3` - neither `curl` nor `wget` is available
//! - `130`, `143`, `129` - stopped by `SIGINT`, `SIGTERM` or `SIGHUP`
//! - `1` - any other failure, including command-line usage errors
//!
//! ## Examples
//!
//! Install into the default location:
//! ```bash
//! ev-install
//! ```
//!
//! Reinstall into a user-writable directory:
//! ```bash
//! INSTALL_DIR="$HOME/.local/bin" ev-install --force
//! ```

mod bootstrap;
mod config;
mod errors;
mod installer;
mod signals;

use anyhow::Result;
use clap::Parser;
use config::{CliOptions, Config};
use errors::{EXIT_FAILURE, InstallerError};
use installer::TempResources;
use signals::{ShutdownSignals, SignalWatcher};
use tracing_subscriber::EnvFilter;

/// Installer for the ev CLI.
#[derive(Parser)]
#[command(
    name = "ev-install",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("EV_INSTALL_GIT_COMMIT"), ")"),
    about = "Installs the ev CLI",
    long_about = "Detects the host platform, downloads the matching ev release and installs \
    the executable. An existing installation is kept unless --force or CLI_FORCE_INSTALL is set.",
    after_help = "\
ENVIRONMENT VARIABLES:
    INSTALL_DIR             Install directory (default: /usr/local/bin, or ~/bin on Windows)
    INSTALL_PATH            Full path of the installed executable (overrides INSTALL_DIR)
    CLI_FORCE_INSTALL       Reinstall even if ev is already present (any value)
    CLI_TMPDIR              Directory for temporary files (default: system temp directory)
    CLI_VERSION             Release to install instead of the bundled default
    CLI_DOWNLOAD_HOST       Artifact host (default: https://cli.evervault.com)
    RUST_LOG                Diagnostic log filter, e.g. RUST_LOG=debug"
)]
pub struct Cli {
    /// Onboarding token passed through by the hosted install command.
    pub token: Option<String>,

    /// Reinstall even if ev is already present.
    #[arg(long)]
    pub force: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints an error and returns the exit status it maps to.
///
/// Stage failures carry their own status; anything else exits with 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(err) = e.downcast_ref::<InstallerError>() {
        eprintln!("Error: {err}");
        return err.exit_code();
    }
    eprintln!("Error: {e:#}");
    EXIT_FAILURE
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exit status for a command-line parse result that ends the process.
///
/// Help and version output exit 0. Usage errors exit 1, never clap's default
/// of 2, which is the unsupported-platform status.
fn usage_exit_code(e: &clap::Error) -> i32 {
    if e.use_stderr() { EXIT_FAILURE } else { 0 }
}

fn parse_args() -> Cli {
    Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(usage_exit_code(&e))
    })
}

async fn run() -> Result<()> {
    let cli = parse_args();
    init_tracing();

    let config = Config::from_env(CliOptions {
        token: cli.token,
        force: cli.force,
    })?;
    tracing::debug!(?config.version, host = %config.download_host, "configuration loaded");

    let resources = TempResources::new(&config.temp_root);
    let signals = ShutdownSignals::register()?;
    let watcher = SignalWatcher::spawn(signals, resources.clone());

    let outcome =
        tokio::task::spawn_blocking(move || bootstrap::execute(&config, &resources)).await?;

    watcher.settle(outcome).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn token_and_force_are_parsed() {
        let cli = Cli::try_parse_from(["ev-install", "abc123", "--force"]).unwrap();
        assert_eq!(cli.token.as_deref(), Some("abc123"));
        assert!(cli.force);

        let cli = Cli::try_parse_from(["ev-install"]).unwrap();
        assert!(cli.token.is_none());
        assert!(!cli.force);
    }

    #[test]
    fn usage_errors_do_not_collide_with_platform_status() {
        let err = Cli::try_parse_from(["ev-install", "--bogus"]).err().expect("usage error");
        assert_eq!(usage_exit_code(&err), EXIT_FAILURE);
        assert_ne!(usage_exit_code(&err), errors::EXIT_UNSUPPORTED_PLATFORM);

        let err = Cli::try_parse_from(["ev-install", "a", "b"]).err().expect("usage error");
        assert_eq!(usage_exit_code(&err), EXIT_FAILURE);
    }

    #[test]
    fn help_and_version_exit_cleanly() {
        let help = Cli::try_parse_from(["ev-install", "--help"]).err().expect("help");
        assert_eq!(usage_exit_code(&help), 0);

        let version = Cli::try_parse_from(["ev-install", "--version"]).err().expect("version");
        assert_eq!(usage_exit_code(&version), 0);
    }

    #[test]
    fn installer_errors_map_to_their_exit_status() {
        let err: anyhow::Error = InstallerError::unsupported_platform("FreeBSD", "x86_64").into();
        assert_eq!(handle_error(&err), errors::EXIT_UNSUPPORTED_PLATFORM);

        let err = anyhow::anyhow!("something else");
        assert_eq!(handle_error(&err), EXIT_FAILURE);
    }
}
