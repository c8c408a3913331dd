//! Output formatting for resolution results
//!
//! This module provides:
//! - Text output for human-readable display
//! - JSON output for machine processing

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::domain::{LatestVersion, Version};
use crate::error::ResolverError;
use std::io::Write;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for machine processing
    Json,
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Result only
    Quiet,
    #[default]
    Normal,
    /// Include the dependency's current version and source
    Verbose,
}

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub verbosity: Verbosity,
    /// Whether to use colors (when supported)
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            verbosity: Verbosity::default(),
            color: true,
        }
    }
}

impl OutputConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(json: bool, verbose: bool, quiet: bool) -> Self {
        let format = if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        };

        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };

        Self {
            format,
            verbosity,
            color: true,
        }
    }
}

/// What an engine operation answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Latest(Option<LatestVersion>),
    SecurityFix(Option<Version>),
    Resolvable {
        version: String,
        resolvable: bool,
    },
    LatestResolvable {
        requirement: String,
        version: Option<Version>,
    },
}

impl Outcome {
    /// Operation name as used on the command line
    pub fn operation(&self) -> &'static str {
        match self {
            Outcome::Latest(_) => "latest",
            Outcome::SecurityFix(_) => "security-fix",
            Outcome::Resolvable { .. } => "resolvable",
            Outcome::LatestResolvable { .. } => "latest-resolvable",
        }
    }
}

/// One dependency's resolution, ready to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub dependency: String,
    pub current_version: Option<String>,
    pub source: String,
    pub outcome: Outcome,
}

impl Resolution {
    pub fn new(dependency: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            dependency: dependency.into(),
            current_version: None,
            source: "default".to_string(),
            outcome,
        }
    }

    pub fn with_current_version(mut self, version: Option<&str>) -> Self {
        self.current_version = version.map(str::to_string);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format and write a successful resolution
    fn format(&self, resolution: &Resolution, writer: &mut dyn Write) -> std::io::Result<()>;

    /// Format and write a resolution error
    fn format_error(&self, error: &ResolverError, writer: &mut dyn Write)
        -> std::io::Result<()>;
}

/// Create an output formatter based on configuration
pub fn create_formatter(config: OutputConfig) -> Box<dyn OutputFormatter> {
    match config.format {
        OutputFormat::Text => Box::new(TextFormatter::with_color(config.verbosity, config.color)),
        OutputFormat::Json => Box::new(JsonFormatter::new(config.verbosity)),
    }
}
