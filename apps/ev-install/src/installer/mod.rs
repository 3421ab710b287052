//! Installation stages for the ev bootstrapper.
//!
//! ## Module Structure
//!
//! - [`platform`] - OS and architecture resolution, artifact lookup
//! - [`target`] - Install location and the already-installed check
//! - [`tools`] - Detection of external download and archive tools
//! - [`download`] - Fetching the release archive
//! - [`archive`] - Unpacking the release archive
//! - [`place`] - Moving the executable into place, with privilege escalation
//! - [`cleanup`] - Temporary resource tracking and release

pub mod archive;
pub mod cleanup;
pub mod download;
pub mod place;
pub mod platform;
pub mod target;
pub mod tools;

pub use archive::extract;
pub use cleanup::TempResources;
pub use download::fetch;
pub use place::{Escalation, escalation_for, install};
pub use platform::PlatformProfile;
pub use target::{InstallDecision, InstallTarget};
pub use tools::ToolRegistry;
