//! Where a dependency's candidate versions come from

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source of candidate versions for a dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VersionSource {
    /// The ecosystem's public registry
    #[default]
    Default,
    /// A named private registry
    #[serde(alias = "rubygems", alias = "pypi", alias = "cargo")]
    Registry {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// A git repository
    Git(GitSource),
    /// A local path
    Path {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
}

impl VersionSource {
    /// Precedence used when a dependency declares several sources
    fn rank(&self) -> u8 {
        match self {
            VersionSource::Git(_) => 3,
            VersionSource::Path { .. } => 2,
            VersionSource::Registry { .. } => 1,
            VersionSource::Default => 0,
        }
    }

    /// Pick the effective source among declared ones.
    ///
    /// Git beats path, path beats a private registry, and anything beats the
    /// default registry. The first declaration wins within a kind.
    pub fn classify<'a>(sources: impl IntoIterator<Item = &'a VersionSource>) -> VersionSource {
        let mut best: Option<&VersionSource> = None;
        for source in sources {
            if best.is_none_or(|b| source.rank() > b.rank()) {
                best = Some(source);
            }
        }
        best.cloned().unwrap_or_default()
    }

    /// Returns true for a git source
    pub fn is_git(&self) -> bool {
        matches!(self, VersionSource::Git(_))
    }

    /// Returns true for a path source
    pub fn is_path(&self) -> bool {
        matches!(self, VersionSource::Path { .. })
    }

    /// URL of a private registry, if any
    pub fn registry_url(&self) -> Option<&str> {
        match self {
            VersionSource::Registry { url } => url.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSource::Default => write!(f, "default registry"),
            VersionSource::Registry { url: Some(url) } => {
                write!(f, "registry {}", crate::error::redact_credentials(url))
            }
            VersionSource::Registry { url: None } => write!(f, "private registry"),
            VersionSource::Git(git) => write!(f, "git {}", crate::error::redact_credentials(&git.url)),
            VersionSource::Path { path } => {
                write!(f, "path {}", path.as_deref().unwrap_or("."))
            }
        }
    }
}

/// A git repository source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitSource {
    /// Remote URL
    pub url: String,
    /// Branch to follow (remote HEAD when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Pinned tag or commit
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl GitSource {
    /// Creates a git source following the remote's default branch
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: None,
            reference: None,
        }
    }

    /// Sets the branch (builder pattern)
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets the pinned ref (builder pattern)
    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// True when a non-blank ref differs from the branch
    pub fn is_pinned(&self) -> bool {
        match self.reference.as_deref().map(str::trim) {
            Some(r) if !r.is_empty() => self.branch.as_deref() != Some(r),
            _ => false,
        }
    }

    /// The same source following its branch instead of the pinned ref
    pub fn unpinned(&self) -> Self {
        Self {
            url: self.url.clone(),
            branch: self.branch.clone(),
            reference: None,
        }
    }

    /// Ref name to resolve on the remote
    pub fn target_ref(&self) -> &str {
        match self.branch.as_deref() {
            Some(b) if !b.trim().is_empty() => b,
            _ => "HEAD",
        }
    }
}
