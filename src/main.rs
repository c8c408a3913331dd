//! depresolve - version resolution CLI
//!
//! Answers one question about one dependency per invocation:
//! - latest: newest allowed version, or head commit for git sources
//! - security-fix: lowest version clearing every advisory
//! - resolvable: whether a candidate version installs
//! - latest-resolvable: newest version installable under a requirement

use anyhow::Context;
use clap::Parser;
use depresolve::cli::{CliArgs, Command};
use depresolve::config::ResolverConfig;
use depresolve::domain::ResolutionRequest;
use depresolve::engine::VersionResolutionEngine;
use depresolve::error::ResolverError;
use depresolve::output::{create_formatter, Outcome, OutputConfig, Resolution};
use depresolve::progress::Progress;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code for resolution errors the caller should act on
const DOMAIN_ERROR_EXIT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(&args);

    match run(&args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &CliArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .try_init();
}

/// Main application logic
async fn run(args: &CliArgs) -> anyhow::Result<ExitCode> {
    let config = match &args.config {
        Some(path) => ResolverConfig::from_file(path)?,
        None => ResolverConfig::new(),
    };
    let request = read_request(args.command.request())?;

    let mut progress = Progress::new(args.show_progress());
    progress.spinner(&format!(
        "Resolving {} ({})",
        request.dependency.name,
        args.command.name()
    ));
    let result = resolve(&args.command, request, &config).await;
    progress.finish_and_clear();

    let formatter = create_formatter(OutputConfig::from_cli(args.json, args.verbose, args.quiet));
    match result {
        Ok(resolution) => {
            let mut stdout = io::stdout().lock();
            formatter.format(&resolution, &mut stdout)?;
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_domain_error() => {
            if args.json {
                let mut stdout = io::stdout().lock();
                formatter.format_error(&e, &mut stdout)?;
                stdout.flush()?;
            } else {
                formatter.format_error(&e, &mut io::stderr().lock())?;
            }
            Ok(ExitCode::from(DOMAIN_ERROR_EXIT))
        }
        Err(e) => Err(e.into()),
    }
}

fn read_request(path: &Path) -> anyhow::Result<ResolutionRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid request file {}", path.display()))
}

async fn resolve(
    command: &Command,
    request: ResolutionRequest,
    config: &ResolverConfig,
) -> Result<Resolution, ResolverError> {
    let name = request.dependency.name.clone();
    let current = request.dependency.version().map(str::to_string);
    let engine = VersionResolutionEngine::for_request(request, config)?;
    let source = engine.context().source().to_string();

    let outcome = match command {
        Command::Latest { .. } => Outcome::Latest(engine.latest_version().await?),
        Command::SecurityFix { .. } => {
            Outcome::SecurityFix(engine.lowest_security_fix_version().await?)
        }
        Command::Resolvable { version, .. } => Outcome::Resolvable {
            resolvable: engine.is_resolvable_str(version).await?,
            version: version.clone(),
        },
        Command::LatestResolvable { requirement, .. } => Outcome::LatestResolvable {
            version: engine.latest_resolvable_version(requirement).await?,
            requirement: requirement.clone(),
        },
    };

    Ok(Resolution::new(name, outcome)
        .with_current_version(current.as_deref())
        .with_source(source))
}
