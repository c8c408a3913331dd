//! Dependency information structures

use super::{PackageManager, VersionSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single requirement line for a dependency in one manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Manifest the requirement was declared in
    pub file: String,
    /// Constraint string, e.g. `>= 1.0, < 2.0`
    #[serde(default)]
    pub requirement: Option<String>,
    /// Group tags (e.g. `development`)
    #[serde(default)]
    pub groups: BTreeSet<String>,
    /// Declared source, if any
    #[serde(default)]
    pub source: Option<VersionSource>,
}

impl Requirement {
    /// Creates a requirement with no constraint
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            requirement: None,
            groups: BTreeSet::new(),
            source: None,
        }
    }

    /// Sets the constraint string (builder pattern)
    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirement = Some(requirement.into());
        self
    }

    /// Sets the source (builder pattern)
    pub fn with_source(mut self, source: VersionSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a group tag (builder pattern)
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }
}

/// Represents a package dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package name
    pub name: String,
    /// Current version or commit SHA
    #[serde(default)]
    pub version: Option<String>,
    /// Requirements across manifests (empty for sub-dependencies)
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// The ecosystem this dependency belongs to
    pub package_manager: PackageManager,
}

impl Dependency {
    /// Creates a new dependency
    pub fn new(name: impl Into<String>, package_manager: PackageManager) -> Self {
        Self {
            name: name.into(),
            version: None,
            requirements: Vec::new(),
            package_manager,
        }
    }

    /// Sets the current version (builder pattern)
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a requirement (builder pattern)
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Returns the current version string, if known
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns true if no manifest declares this dependency directly
    pub fn is_sub_dependency(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Non-null constraint strings across all requirements
    pub fn requirement_strings(&self) -> impl Iterator<Item = &str> {
        self.requirements
            .iter()
            .filter_map(|r| r.requirement.as_deref())
    }

    /// The dependency's own source.
    ///
    /// Only requirements declared in one of `file_names` count; sources
    /// declared in other manifests belong to someone else.
    pub fn source<'a>(&self, file_names: impl IntoIterator<Item = &'a str>) -> VersionSource {
        let names: Vec<&str> = file_names.into_iter().collect();
        VersionSource::classify(
            self.requirements
                .iter()
                .filter(|r| names.contains(&r.file.as_str()))
                .filter_map(|r| r.source.as_ref()),
        )
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{} [{}]", self.name, v, self.package_manager),
            None => write!(f, "{} [{}]", self.name, self.package_manager),
        }
    }
}
