//! HTTP client shared foundation
//!
//! This module provides a shared HTTP client with:
//! - Configurable timeout and User-Agent
//! - Exponential backoff retry logic (max 3 retries by default)
//! - Basic auth from explicit credentials
//! - 404 reported as "absent" rather than as an error

use crate::domain::Credential;
use crate::error::RegistryError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent header
pub const DEFAULT_USER_AGENT: &str = concat!("depresolve/", env!("CARGO_PKG_VERSION"));

/// Maximum number of retry attempts
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BASE_DELAY_MS: u64 = 100;

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, RegistryError> {
        Self::with_config(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(timeout: Duration, user_agent: &str) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                RegistryError::network_error(
                    "",
                    "HTTP client",
                    format!("failed to create HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Perform a GET request with retry logic.
    ///
    /// Returns `Ok(None)` for 404. Timeouts, connection failures, 429 and 5xx
    /// responses are retried with exponential backoff; 401/403 fail at once.
    pub async fn get_with_context(
        &self,
        url: &str,
        package: &str,
        registry: &str,
        credential: Option<&Credential>,
    ) -> Result<Option<reqwest::Response>, RegistryError> {
        let mut last_error = None;
        let mut delay = BASE_DELAY_MS;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Wait before retrying with exponential backoff
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay *= 2;
            }

            debug!(target: "registry", url, attempt, "GET");
            let mut request = self.client.get(url);
            if let Some((user, password)) = credential.and_then(Credential::basic_auth) {
                request = request.basic_auth(user, Some(password));
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(if e.is_timeout() {
                        RegistryError::timeout(package, url)
                    } else {
                        RegistryError::network_error(package, url, e.to_string())
                    });
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(RegistryError::AuthenticationError {
                    url: url.to_string(),
                    message: format!("HTTP {}", status),
                });
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                last_error = Some(RegistryError::RateLimitExceeded {
                    registry: registry.to_string(),
                    url: url.to_string(),
                });
                continue;
            }
            if status.is_server_error() {
                last_error = Some(RegistryError::network_error(
                    package,
                    url,
                    format!("HTTP {}", status),
                ));
                continue;
            }
            if !status.is_success() {
                return Err(RegistryError::network_error(
                    package,
                    url,
                    format!("HTTP {}", status),
                ));
            }

            return Ok(Some(response));
        }

        let error =
            last_error.unwrap_or_else(|| RegistryError::network_error(package, url, "unknown error"));
        warn!(target: "registry", url, error = %error, "giving up after retries");
        Err(error)
    }

    /// Perform a GET request and parse the JSON body; `Ok(None)` for 404
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        package: &str,
        registry: &str,
        credential: Option<&Credential>,
    ) -> Result<Option<T>, RegistryError> {
        let Some(response) = self
            .get_with_context(url, package, registry, credential)
            .await?
        else {
            return Ok(None);
        };

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| RegistryError::InvalidResponse {
                package: package.to_string(),
                registry: registry.to_string(),
                url: url.to_string(),
                message: format!("failed to parse JSON: {}", e),
            })
    }
}
