//! RubyGems Registry adapter
//!
//! Fetches gem version information from a RubyGems-compatible API.
//! API endpoint: {base}/versions/{gem}.json

use crate::domain::{Credentials, PackageManager};
use crate::error::RegistryError;
use crate::registry::{HttpClient, RegistryAdapter};
use crate::update::VersionInfo;
use async_trait::async_trait;
use serde::Deserialize;

/// RubyGems API base URL
pub const RUBYGEMS_API_URL: &str = "https://rubygems.org/api/v1";

/// RubyGems Registry adapter
pub struct RubyGemsAdapter {
    client: HttpClient,
    base_url: String,
}

/// One entry of the versions endpoint
#[derive(Debug, Deserialize)]
struct GemVersion {
    /// Version number
    number: String,
    /// Required Ruby version range
    #[serde(default)]
    ruby_version: Option<String>,
}

impl RubyGemsAdapter {
    /// Create a new RubyGems adapter
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RegistryAdapter for RubyGemsAdapter {
    fn package_manager(&self) -> PackageManager {
        PackageManager::Bundler
    }

    fn registry_name(&self) -> &'static str {
        "rubygems"
    }

    fn versions_url(&self, gem: &str) -> String {
        format!("{}/versions/{}.json", self.base_url, gem)
    }

    async fn fetch_versions(
        &self,
        package: &str,
        credentials: &Credentials,
    ) -> Result<Vec<VersionInfo>, RegistryError> {
        let url = self.versions_url(package);
        let response: Option<Vec<GemVersion>> = self
            .client
            .get_json(&url, package, self.registry_name(), credentials.for_url(&url))
            .await?;

        Ok(response
            .unwrap_or_default()
            .into_iter()
            .map(|v| {
                let info = VersionInfo::new(v.number);
                match v.ruby_version {
                    Some(range) => info.with_runtime_requirement(range),
                    None => info,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_rubygems_adapter_package_manager() {
        let adapter = RubyGemsAdapter::new(HttpClient::new().unwrap(), RUBYGEMS_API_URL);
        assert_eq!(adapter.package_manager(), PackageManager::Bundler);
        assert_eq!(adapter.registry_name(), "rubygems");
    }

    #[test]
    fn test_versions_url() {
        let adapter = RubyGemsAdapter::new(HttpClient::new().unwrap(), "https://rubygems.org/api/v1/");
        assert_eq!(
            adapter.versions_url("business"),
            "https://rubygems.org/api/v1/versions/business.json"
        );
    }

    #[tokio::test]
    async fn test_fetch_versions() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/versions/business.json");
                then.status(200).json_body(serde_json::json!([
                    {"number": "1.5.0", "prerelease": false, "ruby_version": ">= 2.3.0"},
                    {"number": "1.4.0", "prerelease": false, "ruby_version": null},
                    {"number": "1.6.0.beta", "prerelease": true}
                ]));
            })
            .await;

        let adapter = RubyGemsAdapter::new(HttpClient::new().unwrap(), server.base_url());
        let versions = adapter
            .fetch_versions("business", &Credentials::default())
            .await
            .unwrap();
        assert_eq!(versions.len(), 3);
        assert_eq!(versions[0].version, "1.5.0");
        assert_eq!(versions[0].runtime_requirement.as_deref(), Some(">= 2.3.0"));
        assert!(versions[1].runtime_requirement.is_none());
    }

    #[tokio::test]
    async fn test_fetch_versions_not_found_is_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/versions/nonexistent.json");
                then.status(404).body("This rubygem could not be found.");
            })
            .await;

        let adapter = RubyGemsAdapter::new(HttpClient::new().unwrap(), server.base_url());
        let versions = adapter
            .fetch_versions("nonexistent", &Credentials::default())
            .await
            .unwrap();
        assert!(versions.is_empty());
    }
}
