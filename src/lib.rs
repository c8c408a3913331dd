//! depresolve - version resolution for automated dependency updates
//!
//! Given one dependency, the files that declare it, ignore rules, security
//! advisories and credentials, this library answers:
//! - the latest version (or latest commit for git sources)
//! - the lowest version that fixes every known vulnerability
//! - whether a candidate version can be installed
//! - the latest version installable under a requirement
//!
//! Supported ecosystems are Bundler, pip (pip-compile) and Cargo.

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod native;
pub mod output;
pub mod progress;
pub mod registry;
pub mod update;
