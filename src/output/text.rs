//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Colored one-line answers for each engine operation
//! - Error display with the error tag and its details

use crate::domain::LatestVersion;
use crate::error::ResolverError;
use crate::output::{Outcome, OutputFormatter, Resolution, Verbosity};
use colored::Colorize;
use std::io::Write;

/// Text formatter for human-readable output
pub struct TextFormatter {
    verbosity: Verbosity,
    /// Whether to use colors
    color: bool,
}

impl TextFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            color: true,
        }
    }

    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn paint_value(&self, value: &str) -> String {
        if self.color {
            value.green().bold().to_string()
        } else {
            value.to_string()
        }
    }

    fn paint_none(&self, value: &str) -> String {
        if self.color {
            value.dimmed().to_string()
        } else {
            value.to_string()
        }
    }

    /// The answer without the dependency prefix
    fn answer(&self, outcome: &Outcome) -> String {
        match outcome {
            Outcome::Latest(Some(LatestVersion::Version { version })) => {
                self.paint_value(version.as_str())
            }
            Outcome::Latest(Some(LatestVersion::CommitSha { sha })) => {
                format!("{} (commit)", self.paint_value(sha.as_str()))
            }
            Outcome::Latest(None) => self.paint_none("no newer version"),
            Outcome::SecurityFix(Some(version)) => self.paint_value(version.as_str()),
            Outcome::SecurityFix(None) => self.paint_none("no fix available"),
            Outcome::Resolvable {
                version,
                resolvable: true,
            } => format!("{} is {}", version, self.paint_value("resolvable")),
            Outcome::Resolvable {
                version,
                resolvable: false,
            } => {
                let label = if self.color {
                    "not resolvable".yellow().to_string()
                } else {
                    "not resolvable".to_string()
                };
                format!("{} is {}", version, label)
            }
            Outcome::LatestResolvable {
                version: Some(version),
                ..
            } => self.paint_value(version.as_str()),
            Outcome::LatestResolvable {
                requirement,
                version: None,
            } => self.paint_none(&format!("nothing resolves under {}", requirement)),
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, resolution: &Resolution, writer: &mut dyn Write) -> std::io::Result<()> {
        let answer = self.answer(&resolution.outcome);

        if self.verbosity == Verbosity::Quiet {
            return writeln!(writer, "{}", answer);
        }

        let name = if self.color {
            resolution.dependency.bold().to_string()
        } else {
            resolution.dependency.clone()
        };
        writeln!(writer, "{}: {}", name, answer)?;

        if self.verbosity == Verbosity::Verbose {
            writeln!(
                writer,
                "  current: {}",
                resolution.current_version.as_deref().unwrap_or("none")
            )?;
            writeln!(writer, "  source:  {}", resolution.source)?;
        }
        Ok(())
    }

    fn format_error(
        &self,
        error: &ResolverError,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        if self.color {
            writeln!(
                writer,
                "{} {} {}",
                "error:".red().bold(),
                error,
                format!("[{}]", error.error_type()).dimmed()
            )
        } else {
            writeln!(writer, "error: {} [{}]", error, error.error_type())
        }
    }
}
