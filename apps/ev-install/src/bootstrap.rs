//! The installer run, from host probe to installed executable.
//!
//! ## States
//!
//! ```text
//! Init -> Resolved -> Skip
//!                  -> Proceed -> Fetched -> Extracted -> Installed -> Done
//! (any) -> Aborted
//! ```
//!
//! Entering `Proceed` activates the cleanup guard. `Skip` never creates a
//! temporary resource, so it has nothing to clean.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{Config, FORCE_INSTALL_ENV};
use crate::errors::InstallerError;
use crate::installer::{
    Escalation, InstallDecision, InstallTarget, PlatformProfile, TempResources, ToolRegistry,
    escalation_for, extract, fetch, install,
};

/// Position of a run in the installer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Resolved,
    Skip,
    Proceed,
    Fetched,
    Extracted,
    Installed,
    Done,
    Aborted,
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An executable was already present and no reinstall was requested.
    AlreadyInstalled { path: PathBuf },
    /// A fresh copy was installed.
    Installed {
        path: PathBuf,
        version: semver::Version,
        reinstalled: bool,
    },
}

/// Sequences the installer stages for one run.
pub struct Bootstrap<'a> {
    config: &'a Config,
    tools: &'a ToolRegistry,
    escalation: &'a dyn Escalation,
    resources: &'a TempResources,
    state: State,
}

impl<'a> Bootstrap<'a> {
    #[must_use]
    pub fn new(
        config: &'a Config,
        tools: &'a ToolRegistry,
        escalation: &'a dyn Escalation,
        resources: &'a TempResources,
    ) -> Self {
        Self {
            config,
            tools,
            escalation,
            resources,
            state: State::Init,
        }
    }

    /// Current state of the run.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, next: State) {
        tracing::debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    /// Runs every stage to completion.
    ///
    /// Ends in [`State::Done`] on success and [`State::Aborted`] on failure.
    /// All temporary resources are released before this returns.
    ///
    /// # Errors
    ///
    /// Returns an [`InstallerError`] (inside `anyhow::Error`) naming the stage
    /// that failed.
    pub fn run(&mut self) -> Result<Outcome> {
        match self.drive() {
            Ok(outcome) => {
                self.transition(State::Done);
                Ok(outcome)
            }
            Err(e) => {
                self.transition(State::Aborted);
                Err(e)
            }
        }
    }

    fn drive(&mut self) -> Result<Outcome> {
        let config = self.config;
        let profile = PlatformProfile::resolve(&config.host.os, &config.host.arch);
        let target = InstallTarget::resolve(config, &profile)?;
        let decision = InstallDecision::evaluate(&target, config.force);
        self.transition(State::Resolved);

        if decision == InstallDecision::AlreadyInstalled {
            self.transition(State::Skip);
            return Ok(Outcome::AlreadyInstalled {
                path: target.executable_path,
            });
        }

        let Some(download) = profile.download_target(config) else {
            return Err(
                InstallerError::unsupported_platform(&profile.raw_os, &config.host.arch).into(),
            );
        };

        self.transition(State::Proceed);
        let _guard = self.resources.guard();

        if config.token.is_some() {
            tracing::debug!("onboarding token supplied; it is left for the installed CLI");
        }
        if decision == InstallDecision::ForceReinstall {
            println!(
                "Reinstalling {} at {}...",
                config.binary_name,
                target.executable_path.display()
            );
        }

        let downloader = self.tools.downloader()?;
        println!(
            "Downloading {} {} for {profile} from {}...",
            config.binary_name, config.version, download.url
        );
        let archive = fetch(&download.url, downloader, self.resources)
            .map_err(|e| InstallerError::fetch_failed(&e))?;
        self.transition(State::Fetched);

        let extractor = self.tools.extractor()?;
        println!("Extracting...");
        let extracted = extract(&archive, extractor, self.resources)
            .map_err(|e| InstallerError::extract_failed(&e))?;
        self.transition(State::Extracted);

        println!("Installing to {}...", target.executable_path.display());
        install(
            &extracted,
            &profile,
            &config.binary_name,
            &target,
            self.escalation,
        )
        .map_err(|e| InstallerError::install_failed(format!("{e:#}")))?;
        self.transition(State::Installed);

        Ok(Outcome::Installed {
            path: target.executable_path,
            version: config.version.clone(),
            reinstalled: decision == InstallDecision::ForceReinstall,
        })
    }
}

/// Runs the installer against the real host and reports the outcome.
///
/// # Errors
///
/// Returns the stage failure of the run.
pub fn execute(config: &Config, resources: &TempResources) -> Result<()> {
    let profile = PlatformProfile::resolve(&config.host.os, &config.host.arch);
    let tools = ToolRegistry::probe(config.search_path.as_deref());
    let escalation = escalation_for(&profile, config.search_path.as_deref());
    tracing::debug!(
        platform = %profile,
        supported = profile.supported,
        triple = ?profile.target_triple(),
        escalation = escalation.name(),
        temp_root = %resources.root().display(),
        "starting installer"
    );

    let mut bootstrap = Bootstrap::new(config, &tools, escalation.as_ref(), resources);
    let result = bootstrap.run();
    tracing::debug!(state = ?bootstrap.state(), "installer finished");

    report(config, &result?);
    Ok(())
}

fn report(config: &Config, outcome: &Outcome) {
    match outcome {
        Outcome::AlreadyInstalled { path } => {
            println!(
                "{} is already installed at {}.",
                config.binary_name,
                path.display()
            );
            println!(
                "To reinstall, run again with {FORCE_INSTALL_ENV}=1 set or pass --force."
            );
        }
        Outcome::Installed {
            path,
            version,
            reinstalled,
        } => {
            let verb = if *reinstalled { "reinstalled" } else { "installed" };
            println!(
                "{} {version} {verb} successfully at {}.",
                config.binary_name,
                path.display()
            );
            let dir = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            if !on_search_path(config, dir) {
                println!(
                    "Note: {} is not on your PATH. Add it to run '{}' directly.",
                    dir.display(),
                    config.binary_name
                );
            }
        }
    }
}

/// Whether `dir` is one of the `PATH` entries, comparing resolved paths so
/// `.` or a symlinked spelling still matches.
fn on_search_path(config: &Config, dir: &Path) -> bool {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let resolved = std::fs::canonicalize(dir).ok();

    config.search_path.as_ref().is_some_and(|paths| {
        std::env::split_paths(paths)
            .filter(|entry| !entry.as_os_str().is_empty())
            .any(|entry| {
                entry == dir
                    || (resolved.is_some() && std::fs::canonicalize(&entry).ok() == resolved)
            })
    })
}
