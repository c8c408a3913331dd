//! Resolution requests and their results

use super::{
    Credentials, Dependency, DependencyFile, IgnoredVersions, SecurityAdvisory, Version,
};
use crate::error::ResolverError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static COMMIT_SHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").unwrap());

/// A full 40-character lowercase hex git commit id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CommitSha(String);

impl CommitSha {
    /// Validates a commit id; returns `None` for anything but 40 lowercase hex chars
    pub fn parse(sha: &str) -> Option<Self> {
        let sha = sha.trim();
        COMMIT_SHA.is_match(sha).then(|| Self(sha.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a latest-version lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LatestVersion {
    /// A released version
    Version { version: Version },
    /// The head commit of a git dependency
    CommitSha { sha: CommitSha },
}

impl LatestVersion {
    /// Version, if this is a released version
    pub fn as_version(&self) -> Option<&Version> {
        match self {
            LatestVersion::Version { version } => Some(version),
            LatestVersion::CommitSha { .. } => None,
        }
    }
}

impl fmt::Display for LatestVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatestVersion::Version { version } => write!(f, "{}", version),
            LatestVersion::CommitSha { sha } => write!(f, "{}", sha),
        }
    }
}

impl From<Version> for LatestVersion {
    fn from(version: Version) -> Self {
        LatestVersion::Version { version }
    }
}

impl From<CommitSha> for LatestVersion {
    fn from(sha: CommitSha) -> Self {
        LatestVersion::CommitSha { sha }
    }
}

/// Everything the engine needs for one dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub dependency: Dependency,
    pub dependency_files: Vec<DependencyFile>,
    #[serde(default)]
    pub ignored_versions: IgnoredVersions,
    #[serde(default)]
    pub security_advisories: Vec<SecurityAdvisory>,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub raise_on_ignored: bool,
}

impl ResolutionRequest {
    pub fn new(dependency: Dependency, dependency_files: Vec<DependencyFile>) -> Self {
        Self {
            dependency,
            dependency_files,
            ignored_versions: IgnoredVersions::default(),
            security_advisories: Vec::new(),
            credentials: Credentials::default(),
            raise_on_ignored: false,
        }
    }

    /// Sets the ignore ranges (builder pattern)
    pub fn with_ignored_versions(mut self, ignored: IgnoredVersions) -> Self {
        self.ignored_versions = ignored;
        self
    }

    /// Adds an advisory (builder pattern)
    pub fn with_advisory(mut self, advisory: SecurityAdvisory) -> Self {
        self.security_advisories.push(advisory);
        self
    }

    /// Sets the credentials (builder pattern)
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets whether ignoring every version is an error (builder pattern)
    pub fn with_raise_on_ignored(mut self, raise: bool) -> Self {
        self.raise_on_ignored = raise;
        self
    }

    /// Names of the supplied dependency files
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.dependency_files.iter().map(|f| f.name())
    }

    /// Looks up a dependency file by name
    pub fn file(&self, name: &str) -> Option<&DependencyFile> {
        self.dependency_files.iter().find(|f| f.name() == name)
    }

    /// Advisories about this request's dependency
    pub fn relevant_advisories(&self) -> impl Iterator<Item = &SecurityAdvisory> {
        self.security_advisories
            .iter()
            .filter(|a| a.applies_to(&self.dependency))
    }

    /// Checks that every requirement names a supplied file
    pub fn validate(&self) -> Result<(), ResolverError> {
        if self.dependency.name.trim().is_empty() {
            return Err(ResolverError::invalid_request("dependency name is empty"));
        }
        for requirement in &self.dependency.requirements {
            if self.file(&requirement.file).is_none() {
                return Err(ResolverError::invalid_request(format!(
                    "requirement for '{}' references '{}', which is not among the dependency files",
                    self.dependency.name, requirement.file
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PackageManager, Requirement, VersionScheme};

    fn request() -> ResolutionRequest {
        let dep = Dependency::new("business", PackageManager::Bundler)
            .with_version("1.3")
            .with_requirement(Requirement::new("Gemfile").with_requirement("~> 1.3"));
        ResolutionRequest::new(
            dep,
            vec![DependencyFile::new("Gemfile", "gem 'business', '~> 1.3'")],
        )
    }

    #[test]
    fn test_commit_sha_validation() {
        assert!(CommitSha::parse("a1b78a929dac93a52f08db4f2847d76d6cfe39bd").is_some());
        assert!(CommitSha::parse("A1B78A929DAC93A52F08DB4F2847D76D6CFE39BD").is_none());
        assert!(CommitSha::parse("a1b78a9").is_none());
    }

    #[test]
    fn test_validate_accepts_consistent_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_file() {
        let mut req = request();
        req.dependency
            .requirements
            .push(Requirement::new("gems.rb").with_requirement(">= 1"));
        let err = req.validate().unwrap_err();
        assert!(matches!(err, ResolverError::InvalidRequest { .. }));
        assert!(err.to_string().contains("gems.rb"));
    }

    #[test]
    fn test_relevant_advisories() {
        let req = request()
            .with_advisory(SecurityAdvisory::new(
                "business",
                PackageManager::Bundler,
                vec!["<= 1.3.0".to_string()],
            ))
            .with_advisory(SecurityAdvisory::new(
                "statesman",
                PackageManager::Bundler,
                vec!["<= 9.0.0".to_string()],
            ));
        assert_eq!(req.relevant_advisories().count(), 1);
    }

    #[test]
    fn test_latest_version_serialization() {
        let latest = LatestVersion::from(
            Version::parse(VersionScheme::Rubygems, "1.5.0").unwrap(),
        );
        assert_eq!(
            serde_json::to_value(&latest).unwrap(),
            serde_json::json!({"kind": "version", "version": "1.5.0"})
        );
        assert_eq!(latest.to_string(), "1.5.0");
    }

    #[test]
    fn test_request_deserialize_defaults() {
        let req: ResolutionRequest = serde_json::from_str(
            r#"{
                "dependency": {"name": "business", "package_manager": "bundler", "version": "1.3",
                               "requirements": [{"file": "Gemfile", "requirement": "~> 1.3"}]},
                "dependency_files": [{"name": "Gemfile", "content": "gem 'business'"}]
            }"#,
        )
        .unwrap();
        assert!(!req.raise_on_ignored);
        assert!(req.ignored_versions.is_empty());
        assert!(req.validate().is_ok());
    }
}
