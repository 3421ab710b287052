//! Build script for the ev installer.
//!
//! Sets compile-time environment variables for the release this installer
//! targets and for version information.

use std::process::Command;

/// Release host used when `EV_INSTALL_DOWNLOAD_HOST` is not set at build time.
const DEFAULT_DOWNLOAD_HOST: &str = "https://cli.evervault.com";

fn main() {
    // Release version of `ev` installed by default
    let release = std::env::var("EV_INSTALL_RELEASE_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| std::env::var("CARGO_PKG_VERSION").unwrap_or_default());
    println!("cargo:rustc-env=EV_INSTALL_RELEASE_VERSION={release}");
    println!("cargo:rerun-if-env-changed=EV_INSTALL_RELEASE_VERSION");

    let host = std::env::var("EV_INSTALL_DOWNLOAD_HOST")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_HOST.to_string());
    println!("cargo:rustc-env=EV_INSTALL_DOWNLOAD_HOST={host}");
    println!("cargo:rerun-if-env-changed=EV_INSTALL_DOWNLOAD_HOST");

    let commit = get_git_commit();
    println!("cargo:rustc-env=EV_INSTALL_GIT_COMMIT={commit}");

    // Rerun if git HEAD changes (path relative to workspace root)
    if let Some(workspace_root) = get_workspace_root() {
        println!("cargo:rerun-if-changed={workspace_root}/.git/HEAD");
    }
}

/// Gets the workspace root directory.
fn get_workspace_root() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Some(path);
        }
    }
    None
}

/// Gets the short git commit hash.
fn get_git_commit() -> String {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output();

    if let Ok(output) = output
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !hash.is_empty() {
            return hash;
        }
    }

    "unknown".to_string()
}
