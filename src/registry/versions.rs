//! Memoizing version lookups for one engine session
//!
//! Each distinct `(dependency, source)` query reaches the network at most
//! once per `RegistryClient`. Empty answers (an unknown package) are
//! remembered like any other; errors are not.

use super::{latest_commit, GitRemote, RegistryAdapter};
use crate::domain::{CommitSha, Credentials, DependencyFile, GitSource, VersionSource};
use crate::error::ResolverError;
use crate::native::{translate, FailureContext, NativeResolverBridge};
use crate::update::VersionInfo;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Helper function that lists versions from a private registry
const PRIVATE_REGISTRY_VERSIONS: &str = "private_registry_versions";

/// One entry of a private registry listing
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListedVersion {
    Plain(String),
    Detailed {
        version: String,
        #[serde(default)]
        runtime_requirement: Option<String>,
    },
}

impl From<ListedVersion> for VersionInfo {
    fn from(listed: ListedVersion) -> Self {
        match listed {
            ListedVersion::Plain(version) => VersionInfo::new(version),
            ListedVersion::Detailed {
                version,
                runtime_requirement: Some(requirement),
            } => VersionInfo::new(version).with_runtime_requirement(requirement),
            ListedVersion::Detailed { version, .. } => VersionInfo::new(version),
        }
    }
}

type VersionKey = (String, VersionSource);
type CommitKey = (String, Option<String>);

/// Version and commit lookups for one dependency's session
pub struct RegistryClient {
    adapter: Box<dyn RegistryAdapter>,
    bridge: Arc<NativeResolverBridge>,
    git: Arc<dyn GitRemote>,
    files: Vec<DependencyFile>,
    versions: Mutex<HashMap<VersionKey, Vec<VersionInfo>>>,
    commits: Mutex<HashMap<CommitKey, CommitSha>>,
}

impl RegistryClient {
    /// `files` is the set handed to the helper for private registry listings
    pub fn new(
        adapter: Box<dyn RegistryAdapter>,
        bridge: Arc<NativeResolverBridge>,
        git: Arc<dyn GitRemote>,
        files: Vec<DependencyFile>,
    ) -> Self {
        Self {
            adapter,
            bridge,
            git,
            files,
            versions: Mutex::new(HashMap::new()),
            commits: Mutex::new(HashMap::new()),
        }
    }

    /// All versions published for `dependency` on `source`.
    ///
    /// Git and path sources have no version listing and yield nothing.
    pub async fn fetch_versions(
        &self,
        dependency: &str,
        source: &VersionSource,
        credentials: &Credentials,
    ) -> Result<Vec<VersionInfo>, ResolverError> {
        let key = (dependency.to_string(), source.clone());
        let cached = self
            .versions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        if let Some(cached) = cached {
            trace!(target: "registry", dependency, %source, "version cache hit");
            return Ok(cached);
        }

        let versions = match source {
            VersionSource::Default => {
                debug!(
                    target: "registry",
                    dependency,
                    registry = self.adapter.registry_name(),
                    "fetching versions"
                );
                self.adapter.fetch_versions(dependency, credentials).await?
            }
            VersionSource::Registry { url } => {
                self.private_versions(dependency, url.as_deref(), credentials)
                    .await?
            }
            VersionSource::Git(_) | VersionSource::Path { .. } => Vec::new(),
        };

        debug!(target: "registry", dependency, %source, count = versions.len(), "versions fetched");
        self.versions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, versions.clone());
        Ok(versions)
    }

    async fn private_versions(
        &self,
        dependency: &str,
        url: Option<&str>,
        credentials: &Credentials,
    ) -> Result<Vec<VersionInfo>, ResolverError> {
        let registry = url.unwrap_or(dependency).to_string();
        debug!(
            target: "registry",
            dependency,
            registry = %crate::error::redact_credentials(&registry),
            "listing private registry through helper"
        );
        let args = json!({
            "dependency_name": dependency,
            "source_url": url,
            "credentials": credentials,
        });

        let value = self
            .bridge
            .invoke(PRIVATE_REGISTRY_VERSIONS, args, &self.files)
            .await
            .map_err(|failure| {
                translate(
                    &failure,
                    &FailureContext::RegistryListing {
                        registry: registry.clone(),
                        dependency: dependency.to_string(),
                    },
                )
            })?;

        let listed = match value {
            Value::Null => Vec::new(),
            other => Vec::<ListedVersion>::deserialize(other).map_err(|e| {
                ResolverError::not_resolvable(format!(
                    "unexpected version listing from {}: {}",
                    crate::error::redact_credentials(&registry),
                    e
                ))
            })?,
        };
        Ok(listed.into_iter().map(VersionInfo::from).collect())
    }

    /// Latest commit on the git source's branch, remembered per `(url, branch)`
    pub async fn fetch_commit_sha(
        &self,
        dependency: &str,
        source: &GitSource,
        credentials: &Credentials,
    ) -> Result<CommitSha, ResolverError> {
        let key = (source.url.clone(), source.branch.clone());
        let cached = self
            .commits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        if let Some(sha) = cached {
            trace!(target: "git", dependency, "commit cache hit");
            return Ok(sha);
        }

        let sha = latest_commit(self.git.as_ref(), source, dependency, credentials).await?;
        debug!(target: "git", dependency, sha = sha.as_str(), "resolved latest commit");
        self.commits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, sha.clone());
        Ok(sha)
    }
}
