//! Package manager (ecosystem) definitions

use super::VersionScheme;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    /// Ruby ecosystem (Gemfile / gems.rb)
    Bundler,
    /// Python ecosystem using pip-compile (requirements.in)
    Pip,
    /// Rust ecosystem (Cargo.toml)
    Cargo,
}

impl PackageManager {
    /// Returns the display name for this package manager
    pub fn display_name(&self) -> &'static str {
        match self {
            PackageManager::Bundler => "Bundler",
            PackageManager::Pip => "pip-compile",
            PackageManager::Cargo => "Cargo",
        }
    }

    /// Version grammar used by this ecosystem
    pub fn version_scheme(&self) -> VersionScheme {
        match self {
            PackageManager::Bundler | PackageManager::Pip => VersionScheme::Rubygems,
            PackageManager::Cargo => VersionScheme::Semver,
        }
    }

    /// Whether candidate versions must be checked against the full dependency graph
    pub fn requires_full_graph(&self) -> bool {
        matches!(self, PackageManager::Pip)
    }

    /// File that pins the language runtime version, if the ecosystem has one
    pub fn runtime_version_file(&self) -> Option<&'static str> {
        match self {
            PackageManager::Bundler => Some(".ruby-version"),
            PackageManager::Pip => Some(".python-version"),
            PackageManager::Cargo => None,
        }
    }

    /// Default executable name of the native helper
    pub fn default_helper(&self) -> &'static str {
        match self {
            PackageManager::Bundler => "bundler-native-helper",
            PackageManager::Pip => "pip-native-helper",
            PackageManager::Cargo => "cargo-native-helper",
        }
    }

    /// Returns all supported package managers
    pub fn all() -> &'static [PackageManager] {
        &[
            PackageManager::Bundler,
            PackageManager::Pip,
            PackageManager::Cargo,
        ]
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
