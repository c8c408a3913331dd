//! Resolver configuration
//!
//! Defaults work without any configuration file. A TOML file may override
//! any subset of the settings; unknown keys are rejected.
//!
//! ```toml
//! http_timeout_secs = 30
//! max_retries = 3
//! rubygems_url = "https://rubygems.org/api/v1"
//! helper_timeout_secs = 300
//!
//! [helpers.pip]
//! program = "python3"
//! args = ["-m", "pip_native_helper"]
//! ```

use crate::domain::PackageManager;
use crate::error::ConfigError;
use crate::registry::{
    CRATES_IO_API_URL, DEFAULT_GIT_TIMEOUT, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, MAX_RETRIES,
    PYPI_API_URL, RUBYGEMS_API_URL,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Default timeout for one native helper invocation (5 minutes)
pub const DEFAULT_HELPER_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound accepted for `max_retries`
const MAX_RETRIES_LIMIT: u32 = 10;

/// Command line of a native helper
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HelperCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl HelperCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Adds an argument (builder pattern)
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Configuration for one engine
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub http_timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    pub rubygems_url: String,
    pub pypi_url: String,
    pub crates_io_url: String,
    pub helper_timeout: Duration,
    pub git_timeout: Duration,
    pub git_program: String,
    helpers: HashMap<PackageManager, HelperCommand>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            http_timeout: DEFAULT_TIMEOUT,
            max_retries: MAX_RETRIES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            rubygems_url: RUBYGEMS_API_URL.to_string(),
            pypi_url: PYPI_API_URL.to_string(),
            crates_io_url: CRATES_IO_API_URL.to_string(),
            helper_timeout: DEFAULT_HELPER_TIMEOUT,
            git_timeout: DEFAULT_GIT_TIMEOUT,
            git_program: "git".to_string(),
            helpers: HashMap::new(),
        }
    }
}

/// On-disk representation; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    http_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    user_agent: Option<String>,
    rubygems_url: Option<String>,
    pypi_url: Option<String>,
    crates_io_url: Option<String>,
    helper_timeout_secs: Option<u64>,
    git_timeout_secs: Option<u64>,
    git_program: Option<String>,
    #[serde(default)]
    helpers: HashMap<PackageManager, HelperCommand>,
}

fn seconds(key: &str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(value))
}

impl ResolverConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text on top of the defaults
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: Default::default(),
            message: e.to_string(),
        })?;

        let mut config = Self::default();
        if let Some(secs) = file.http_timeout_secs {
            config.http_timeout = seconds("http_timeout_secs", secs)?;
        }
        if let Some(retries) = file.max_retries {
            if retries > MAX_RETRIES_LIMIT {
                return Err(ConfigError::InvalidValue {
                    key: "max_retries".to_string(),
                    message: format!("must be at most {}", MAX_RETRIES_LIMIT),
                });
            }
            config.max_retries = retries;
        }
        if let Some(secs) = file.helper_timeout_secs {
            config.helper_timeout = seconds("helper_timeout_secs", secs)?;
        }
        if let Some(secs) = file.git_timeout_secs {
            config.git_timeout = seconds("git_timeout_secs", secs)?;
        }
        config.user_agent = file.user_agent.unwrap_or(config.user_agent);
        config.rubygems_url = file.rubygems_url.unwrap_or(config.rubygems_url);
        config.pypi_url = file.pypi_url.unwrap_or(config.pypi_url);
        config.crates_io_url = file.crates_io_url.unwrap_or(config.crates_io_url);
        config.git_program = file.git_program.unwrap_or(config.git_program);
        config.helpers = file.helpers;
        Ok(config)
    }

    /// Set the HTTP timeout
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the maximum number of HTTP retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the public registry URL for an ecosystem
    pub fn with_registry_url(mut self, package_manager: PackageManager, url: impl Into<String>) -> Self {
        let url = url.into();
        match package_manager {
            PackageManager::Bundler => self.rubygems_url = url,
            PackageManager::Pip => self.pypi_url = url,
            PackageManager::Cargo => self.crates_io_url = url,
        }
        self
    }

    /// Set the native helper timeout
    pub fn with_helper_timeout(mut self, timeout: Duration) -> Self {
        self.helper_timeout = timeout;
        self
    }

    /// Set the git timeout
    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git_timeout = timeout;
        self
    }

    /// Set the helper command for an ecosystem
    pub fn with_helper(mut self, package_manager: PackageManager, command: HelperCommand) -> Self {
        self.helpers.insert(package_manager, command);
        self
    }

    /// Public registry URL for an ecosystem
    pub fn registry_url(&self, package_manager: PackageManager) -> &str {
        match package_manager {
            PackageManager::Bundler => &self.rubygems_url,
            PackageManager::Pip => &self.pypi_url,
            PackageManager::Cargo => &self.crates_io_url,
        }
    }

    /// Helper command for an ecosystem, falling back to the default on PATH
    pub fn helper(&self, package_manager: PackageManager) -> HelperCommand {
        self.helpers
            .get(&package_manager)
            .cloned()
            .unwrap_or_else(|| HelperCommand::new(package_manager.default_helper()))
    }
}
