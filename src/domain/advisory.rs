//! Security advisories and user ignore rules

use super::{Constraint, Dependency, PackageManager, Version, VersionScheme};
use crate::error::ResolverError;
use serde::{Deserialize, Serialize};

/// A published vulnerability for one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAdvisory {
    /// Name of the affected dependency
    pub dependency_name: String,
    /// Ecosystem of the affected dependency
    pub package_manager: PackageManager,
    /// Ranges of vulnerable versions
    #[serde(default)]
    pub vulnerable_versions: Vec<String>,
}

impl SecurityAdvisory {
    pub fn new(
        dependency_name: impl Into<String>,
        package_manager: PackageManager,
        vulnerable_versions: Vec<String>,
    ) -> Self {
        Self {
            dependency_name: dependency_name.into(),
            package_manager,
            vulnerable_versions,
        }
    }

    /// Whether this advisory is about `dependency`
    pub fn applies_to(&self, dependency: &Dependency) -> bool {
        self.package_manager == dependency.package_manager
            && same_package(
                dependency.package_manager,
                &self.dependency_name,
                &dependency.name,
            )
    }

    /// Parsed vulnerable ranges
    pub fn constraints(&self, scheme: VersionScheme) -> Result<Vec<Constraint>, ResolverError> {
        self.vulnerable_versions
            .iter()
            .map(|r| Constraint::parse_range(scheme, r))
            .collect()
    }

    /// Whether `version` falls in any vulnerable range
    pub fn is_vulnerable(&self, scheme: VersionScheme, version: &Version) -> Result<bool, ResolverError> {
        Ok(self.constraints(scheme)?.iter().any(|c| c.matches(version)))
    }
}

/// pip names compare case-insensitively with `-`, `_` and `.` folded
fn same_package(package_manager: PackageManager, a: &str, b: &str) -> bool {
    match package_manager {
        PackageManager::Pip => normalize_python_name(a) == normalize_python_name(b),
        _ => a == b,
    }
}

/// PEP 503 name normalization
pub fn normalize_python_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        }
    }
    out
}

/// User-specified version ranges to skip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoredVersions(Vec<String>);

impl IgnoredVersions {
    pub fn new(ranges: Vec<String>) -> Self {
        Self(ranges)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parsed ignore ranges
    pub fn constraints(&self, scheme: VersionScheme) -> Result<Vec<Constraint>, ResolverError> {
        self.0
            .iter()
            .map(|r| Constraint::parse_range(scheme, r))
            .collect()
    }
}

impl From<Vec<&str>> for IgnoredVersions {
    fn from(ranges: Vec<&str>) -> Self {
        Self(ranges.into_iter().map(String::from).collect())
    }
}
