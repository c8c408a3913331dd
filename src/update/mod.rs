//! Candidate selection
//!
//! This module provides:
//! - The candidate filter applying ignore rules, advisories, pre-release
//!   policy and runtime eligibility
//! - Version info from registries with runtime requirements

mod filter;
mod version_info;

pub use filter::CandidateFilter;
pub use version_info::{runtime_eligibility, runtime_version, Eligibility, VersionInfo};
