//! JSON output formatter for machine processing
//!
//! This module provides:
//! - JSON serialization of a single resolution
//! - The `{"error_type", "details"}` error document

use crate::domain::{LatestVersion, Version};
use crate::error::ResolverError;
use crate::output::{Outcome, OutputFormatter, Resolution, Verbosity};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    /// Verbosity level affects detail in output
    verbosity: Verbosity,
}

impl JsonFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

/// JSON representation of a resolution
#[derive(Serialize)]
struct JsonResolution<'a> {
    dependency: &'a str,
    operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    #[serde(flatten)]
    result: JsonResult<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum JsonResult<'a> {
    Latest {
        latest: Option<&'a LatestVersion>,
    },
    Version {
        version: Option<&'a Version>,
    },
    Resolvable {
        version: &'a str,
        resolvable: bool,
    },
    Constrained {
        requirement: &'a str,
        version: Option<&'a Version>,
    },
}

impl<'a> From<&'a Outcome> for JsonResult<'a> {
    fn from(outcome: &'a Outcome) -> Self {
        match outcome {
            Outcome::Latest(latest) => JsonResult::Latest {
                latest: latest.as_ref(),
            },
            Outcome::SecurityFix(version) => JsonResult::Version {
                version: version.as_ref(),
            },
            Outcome::Resolvable {
                version,
                resolvable,
            } => JsonResult::Resolvable {
                version,
                resolvable: *resolvable,
            },
            Outcome::LatestResolvable {
                requirement,
                version,
            } => JsonResult::Constrained {
                requirement,
                version: version.as_ref(),
            },
        }
    }
}

#[derive(Serialize)]
struct JsonError {
    error_type: &'static str,
    details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn write_json<T: Serialize>(value: &T, writer: &mut dyn Write) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    writeln!(writer, "{}", json)
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, resolution: &Resolution, writer: &mut dyn Write) -> std::io::Result<()> {
        let verbose = self.verbosity == Verbosity::Verbose;
        let output = JsonResolution {
            dependency: &resolution.dependency,
            operation: resolution.outcome.operation(),
            current_version: resolution.current_version.as_deref(),
            source: verbose.then_some(resolution.source.as_str()),
            result: JsonResult::from(&resolution.outcome),
        };
        write_json(&output, writer)
    }

    fn format_error(
        &self,
        error: &ResolverError,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let output = JsonError {
            error_type: error.error_type(),
            details: error.details(),
            message: (self.verbosity == Verbosity::Verbose).then(|| error.to_string()),
        };
        write_json(&output, writer)
    }
}
