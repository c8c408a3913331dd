//! PyPI JSON API adapter
//!
//! Fetches package version information from PyPI.
//! API endpoint: {base}/{package}/json

use crate::domain::{normalize_python_name, Credentials, PackageManager};
use crate::error::RegistryError;
use crate::registry::{HttpClient, RegistryAdapter};
use crate::update::VersionInfo;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// PyPI API base URL
pub const PYPI_API_URL: &str = "https://pypi.org/pypi";

/// PyPI adapter
pub struct PyPIAdapter {
    client: HttpClient,
    base_url: String,
}

/// PyPI package metadata response
#[derive(Debug, Deserialize)]
struct PyPIResponse {
    /// Release files keyed by version
    releases: HashMap<String, Vec<ReleaseFile>>,
}

/// Release file information
#[derive(Debug, Deserialize)]
struct ReleaseFile {
    #[serde(default)]
    yanked: bool,
    #[serde(default)]
    requires_python: Option<String>,
}

impl PyPIAdapter {
    /// Create a new PyPI adapter
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RegistryAdapter for PyPIAdapter {
    fn package_manager(&self) -> PackageManager {
        PackageManager::Pip
    }

    fn registry_name(&self) -> &'static str {
        "PyPI"
    }

    fn versions_url(&self, package: &str) -> String {
        format!("{}/{}/json", self.base_url, normalize_python_name(package))
    }

    async fn fetch_versions(
        &self,
        package: &str,
        credentials: &Credentials,
    ) -> Result<Vec<VersionInfo>, RegistryError> {
        let url = self.versions_url(package);
        let Some(response) = self
            .client
            .get_json::<PyPIResponse>(&url, package, self.registry_name(), credentials.for_url(&url))
            .await?
        else {
            return Ok(Vec::new());
        };

        // Releases without files, or with every file yanked, are not installable
        let mut versions: Vec<VersionInfo> = response
            .releases
            .into_iter()
            .filter(|(_, files)| files.iter().any(|f| !f.yanked))
            .map(|(version, files)| {
                let info = VersionInfo::new(version);
                match files.into_iter().find_map(|f| f.requires_python) {
                    Some(range) => info.with_runtime_requirement(range),
                    None => info,
                }
            })
            .collect();

        // HashMap order is arbitrary
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(versions)
    }
}
