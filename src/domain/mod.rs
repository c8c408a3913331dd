//! Core domain models for depresolve
//!
//! This module contains the fundamental types used throughout the crate:
//! - Package managers and their version grammars
//! - Versions and version constraints
//! - Dependencies, requirements and their sources
//! - Dependency files, advisories, ignore rules and credentials
//! - Resolution requests and results

mod advisory;
mod constraint;
mod credentials;
mod dependency;
mod dependency_file;
mod package_manager;
mod request;
mod source;
mod version;

pub use advisory::{normalize_python_name, IgnoredVersions, SecurityAdvisory};
pub use constraint::Constraint;
pub use credentials::{Credential, Credentials};
pub use dependency::{Dependency, Requirement};
pub use dependency_file::{ContentEncoding, DependencyFile};
pub use package_manager::PackageManager;
pub use request::{CommitSha, LatestVersion, ResolutionRequest};
pub use source::{GitSource, VersionSource};
pub use version::{Version, VersionScheme};
