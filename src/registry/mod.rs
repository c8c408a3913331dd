//! Registry adapters for fetching package version information
//!
//! This module provides:
//! - HTTP client shared foundation with retry logic
//! - RubyGems API adapter
//! - PyPI JSON API adapter
//! - crates.io API adapter
//! - Git remote lookups
//! - The memoizing client the engine talks to

mod client;
mod crates_io;
mod git;
mod pypi;
mod rubygems;
mod versions;

pub use client::{HttpClient, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, MAX_RETRIES};
pub use crates_io::{CratesIoAdapter, CRATES_IO_API_URL};
pub use git::{
    authenticated_url, find_ref, latest_commit, GitRemote, SystemGit, DEFAULT_GIT_TIMEOUT,
};
pub use pypi::{PyPIAdapter, PYPI_API_URL};
pub use rubygems::{RubyGemsAdapter, RUBYGEMS_API_URL};
pub use versions::RegistryClient;

use crate::config::ResolverConfig;
use crate::domain::{Credentials, PackageManager};
use crate::error::RegistryError;
use crate::update::VersionInfo;
use async_trait::async_trait;

/// Trait for public registry adapters
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Get the package manager this adapter serves
    fn package_manager(&self) -> PackageManager;

    /// Get the registry name
    fn registry_name(&self) -> &'static str;

    /// URL of the versions endpoint for a package
    fn versions_url(&self, package: &str) -> String;

    /// Fetch available versions for a package; an unknown package has none
    async fn fetch_versions(
        &self,
        package: &str,
        credentials: &Credentials,
    ) -> Result<Vec<VersionInfo>, RegistryError>;
}

/// Create the public registry adapter for the given package manager
pub fn create_adapter(
    package_manager: PackageManager,
    client: HttpClient,
    config: &ResolverConfig,
) -> Box<dyn RegistryAdapter> {
    let base_url = config.registry_url(package_manager);
    match package_manager {
        PackageManager::Bundler => Box::new(RubyGemsAdapter::new(client, base_url)),
        PackageManager::Pip => Box::new(PyPIAdapter::new(client, base_url)),
        PackageManager::Cargo => Box::new(CratesIoAdapter::new(client, base_url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_adapter() {
        let config = ResolverConfig::new();
        for pm in PackageManager::all() {
            let adapter = create_adapter(*pm, HttpClient::new().unwrap(), &config);
            assert_eq!(adapter.package_manager(), *pm);
        }
    }

    #[test]
    fn test_create_adapter_uses_configured_url() {
        let config = ResolverConfig::new()
            .with_registry_url(PackageManager::Bundler, "http://localhost:9292/api/v1/");
        let adapter = create_adapter(PackageManager::Bundler, HttpClient::new().unwrap(), &config);
        assert_eq!(
            adapter.versions_url("business"),
            "http://localhost:9292/api/v1/versions/business.json"
        );
    }
}
