//! CLI argument parsing module for depresolve

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Version resolution for automated dependency updates
#[derive(Parser, Debug, Clone)]
#[command(
    name = "depresolve",
    version,
    about = "Version resolution for automated dependency updates"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Show detailed logging on stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress the progress spinner
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Latest available version (or commit SHA for git dependencies)
    Latest {
        /// JSON request file
        #[arg(long)]
        request: PathBuf,
    },

    /// Lowest version that fixes every known vulnerability
    SecurityFix {
        /// JSON request file
        #[arg(long)]
        request: PathBuf,
    },

    /// Check whether a candidate version can be installed
    Resolvable {
        /// JSON request file
        #[arg(long)]
        request: PathBuf,

        /// Candidate version
        #[arg(long)]
        version: String,
    },

    /// Highest version the graph resolves to under a requirement
    LatestResolvable {
        /// JSON request file
        #[arg(long)]
        request: PathBuf,

        /// Requirement to resolve under (e.g. ">= 1.0, < 2.0")
        #[arg(long)]
        requirement: String,
    },
}

impl Command {
    /// Request file shared by every subcommand
    pub fn request(&self) -> &PathBuf {
        match self {
            Command::Latest { request }
            | Command::SecurityFix { request }
            | Command::Resolvable { request, .. }
            | Command::LatestResolvable { request, .. } => request,
        }
    }

    /// Name used in log lines and spinner messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Latest { .. } => "latest",
            Command::SecurityFix { .. } => "security-fix",
            Command::Resolvable { .. } => "resolvable",
            Command::LatestResolvable { .. } => "latest-resolvable",
        }
    }
}

impl CliArgs {
    /// Whether a spinner should be drawn
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Default log filter when RUST_LOG is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}
