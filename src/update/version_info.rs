//! Version information from registries
//!
//! A registry listing yields the version string plus, where the registry
//! publishes it, the language-runtime requirement of that release. The
//! runtime requirement feeds the eligibility predicate of the filter.

use crate::domain::{Constraint, DependencyFile, Version, VersionScheme};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Predicate deciding whether a candidate can run in the current environment
pub type Eligibility = Arc<dyn Fn(&Version) -> bool + Send + Sync>;

/// Information about a package version from the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// The version string (e.g., "1.2.3")
    pub version: String,
    /// Runtime range this release supports (e.g. `>= 2.3.0`), if published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_requirement: Option<String>,
}

impl VersionInfo {
    /// Create a new VersionInfo without a runtime requirement
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            runtime_requirement: None,
        }
    }

    /// Sets the runtime requirement (builder pattern)
    pub fn with_runtime_requirement(mut self, requirement: impl Into<String>) -> Self {
        let requirement = requirement.into();
        self.runtime_requirement = (!requirement.trim().is_empty()).then_some(requirement);
        self
    }
}

/// Reads the runtime version pinned by a `.ruby-version` / `.python-version` file.
///
/// Unparseable contents are ignored with a warning.
pub fn runtime_version(file: &DependencyFile) -> Option<Version> {
    let content = file.content()?.trim();
    let first_line = content.lines().next().unwrap_or_default().trim();
    let candidate = first_line.strip_prefix("ruby-").unwrap_or(first_line);

    let version = Version::parse(VersionScheme::Rubygems, candidate);
    if version.is_none() {
        warn!(
            target: "engine",
            file = file.name(),
            content = first_line,
            "ignoring unparseable runtime version file"
        );
    }
    version
}

/// Builds an eligibility predicate that rejects releases whose runtime
/// requirement excludes `runtime`.
///
/// Releases without a published requirement, or with one that does not
/// parse, stay eligible.
pub fn runtime_eligibility(infos: &[VersionInfo], runtime: &Version) -> Eligibility {
    let excluded: HashMap<String, bool> = infos
        .iter()
        .filter_map(|info| {
            let requirement = info.runtime_requirement.as_deref()?;
            let constraint = Constraint::parse_range(VersionScheme::Rubygems, requirement).ok()?;
            Some((info.version.clone(), !constraint.matches(runtime)))
        })
        .collect();

    Arc::new(move |version: &Version| !excluded.get(version.as_str()).copied().unwrap_or(false))
}
