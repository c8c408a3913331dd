//! crates.io API adapter
//!
//! Fetches crate version information from crates.io.
//! API endpoint: {base}/{crate}
//!
//! Note: crates.io requires a User-Agent header (handled by HttpClient)
//! and has rate limiting (1 request/second).

use crate::domain::{Credentials, PackageManager};
use crate::error::RegistryError;
use crate::registry::{HttpClient, RegistryAdapter};
use crate::update::VersionInfo;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::time::{Duration, Instant};

/// crates.io API base URL
pub const CRATES_IO_API_URL: &str = "https://crates.io/api/v1/crates";

/// Rate limit: 1 request per second
const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(1);

/// crates.io adapter with rate limiting
pub struct CratesIoAdapter {
    client: HttpClient,
    base_url: String,
    rate_limiter: Arc<Semaphore>,
    last_request: Mutex<Option<Instant>>,
}

/// crates.io crate response
#[derive(Debug, Deserialize)]
struct CratesIoResponse {
    versions: Vec<CrateVersion>,
}

/// Crate version information
#[derive(Debug, Deserialize)]
struct CrateVersion {
    /// Version number
    num: String,
    /// Whether this version is yanked
    #[serde(default)]
    yanked: bool,
    /// Minimum supported Rust version
    #[serde(default)]
    rust_version: Option<String>,
}

impl CratesIoAdapter {
    /// Create a new crates.io adapter
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(Semaphore::new(1)),
            last_request: Mutex::new(None),
        }
    }

    /// Apply rate limiting before making a request
    async fn apply_rate_limit(&self) {
        // The semaphore is never closed
        let _permit = self.rate_limiter.acquire().await.ok();

        let elapsed = {
            let last_request = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
            last_request.map(|t| t.elapsed())
        };

        if let Some(elapsed) = elapsed {
            if elapsed < RATE_LIMIT_INTERVAL {
                tokio::time::sleep(RATE_LIMIT_INTERVAL - elapsed).await;
            }
        }

        let mut last_request = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
        *last_request = Some(Instant::now());
    }
}

#[async_trait]
impl RegistryAdapter for CratesIoAdapter {
    fn package_manager(&self) -> PackageManager {
        PackageManager::Cargo
    }

    fn registry_name(&self) -> &'static str {
        "crates.io"
    }

    fn versions_url(&self, crate_name: &str) -> String {
        format!("{}/{}", self.base_url, crate_name)
    }

    async fn fetch_versions(
        &self,
        package: &str,
        credentials: &Credentials,
    ) -> Result<Vec<VersionInfo>, RegistryError> {
        self.apply_rate_limit().await;

        let url = self.versions_url(package);
        let response: Option<CratesIoResponse> = self
            .client
            .get_json(&url, package, self.registry_name(), credentials.for_url(&url))
            .await?;

        Ok(response
            .map(|r| r.versions)
            .unwrap_or_default()
            .into_iter()
            .filter(|v| !v.yanked)
            .map(|v| {
                let info = VersionInfo::new(v.num);
                match v.rust_version {
                    // rust-version is a minimum
                    Some(msrv) => info.with_runtime_requirement(format!(">= {}", msrv)),
                    None => info,
                }
            })
            .collect())
    }
}
