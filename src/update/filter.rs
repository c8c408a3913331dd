//! Candidate version filter
//!
//! This module provides the CandidateFilter struct that encapsulates all
//! rules for picking a version out of a registry listing. Filtering is pure:
//! the same input always yields the same output.

use super::Eligibility;
use crate::domain::{Constraint, Version, VersionScheme};
use crate::error::ResolverError;
use std::cmp::Ordering;
use std::fmt;

/// Filter configuration for candidate selection
#[derive(Clone, Default)]
pub struct CandidateFilter {
    /// Ranges the user asked to skip
    pub ignored: Vec<Constraint>,
    /// Ranges known to be vulnerable
    pub vulnerable: Vec<Constraint>,
    /// Fail instead of returning nothing when ignore rules remove everything
    pub raise_on_ignored: bool,
    /// Consider pre-release versions
    pub allow_prerelease: bool,
    /// Runtime eligibility predicate
    eligibility: Option<Eligibility>,
}

impl fmt::Debug for CandidateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateFilter")
            .field("ignored", &self.ignored)
            .field("vulnerable", &self.vulnerable)
            .field("raise_on_ignored", &self.raise_on_ignored)
            .field("allow_prerelease", &self.allow_prerelease)
            .field("eligibility", &self.eligibility.is_some())
            .finish()
    }
}

impl CandidateFilter {
    /// Create a new CandidateFilter that keeps every stable version
    pub fn new() -> Self {
        Self::default()
    }

    /// Set ranges to ignore
    pub fn with_ignored(mut self, ignored: Vec<Constraint>) -> Self {
        self.ignored = ignored;
        self
    }

    /// Set vulnerable ranges
    pub fn with_vulnerable(mut self, vulnerable: Vec<Constraint>) -> Self {
        self.vulnerable = vulnerable;
        self
    }

    /// Set whether ignoring every version is an error
    pub fn with_raise_on_ignored(mut self, raise: bool) -> Self {
        self.raise_on_ignored = raise;
        self
    }

    /// Set whether pre-releases are candidates
    pub fn with_prerelease(mut self, allow: bool) -> Self {
        self.allow_prerelease = allow;
        self
    }

    /// Set the runtime eligibility predicate
    pub fn with_eligibility(mut self, eligibility: Eligibility) -> Self {
        self.eligibility = Some(eligibility);
        self
    }

    /// Parse raw version strings, silently dropping those that don't parse.
    ///
    /// The result is sorted ascending with duplicates removed.
    pub fn parse_versions<I, S>(scheme: VersionScheme, raw: I) -> Vec<Version>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut versions: Vec<Version> = raw
            .into_iter()
            .filter_map(|v| Version::parse(scheme, v.as_ref()))
            .collect();
        versions.sort();
        versions.dedup();
        versions
    }

    fn filter_prereleases(&self, versions: Vec<Version>) -> Vec<Version> {
        if self.allow_prerelease {
            return versions;
        }
        versions.into_iter().filter(|v| !v.is_prerelease()).collect()
    }

    fn filter_ignored(&self, versions: Vec<Version>) -> Result<Vec<Version>, ResolverError> {
        if self.ignored.is_empty() {
            return Ok(versions);
        }
        let had_candidates = !versions.is_empty();
        let remaining: Vec<Version> = versions
            .into_iter()
            .filter(|v| !self.ignored.iter().any(|c| c.matches(v)))
            .collect();

        if remaining.is_empty() && had_candidates && self.raise_on_ignored {
            return Err(ResolverError::AllVersionsIgnored);
        }
        Ok(remaining)
    }

    fn filter_vulnerable(&self, versions: Vec<Version>) -> Vec<Version> {
        versions
            .into_iter()
            .filter(|v| !self.vulnerable.iter().any(|c| c.matches(v)))
            .collect()
    }

    fn filter_ineligible(&self, versions: Vec<Version>) -> Vec<Version> {
        match &self.eligibility {
            Some(eligible) => versions.into_iter().filter(|v| eligible(v)).collect(),
            None => versions,
        }
    }

    /// Apply pre-release policy, ignore rules and eligibility
    pub fn filter(&self, versions: &[Version]) -> Result<Vec<Version>, ResolverError> {
        let versions = self.filter_prereleases(versions.to_vec());
        let versions = self.filter_ignored(versions)?;
        Ok(self.filter_ineligible(versions))
    }

    /// Highest version surviving `filter`
    pub fn latest(&self, versions: &[Version]) -> Result<Option<Version>, ResolverError> {
        Ok(self.filter(versions)?.into_iter().max())
    }

    /// Lowest non-vulnerable, non-ignored version strictly above `current`
    pub fn lowest_security_fix(
        &self,
        versions: &[Version],
        current: Option<&Version>,
    ) -> Result<Option<Version>, ResolverError> {
        let versions = self.filter_prereleases(versions.to_vec());
        let versions = self.filter_vulnerable(versions);
        let versions = self.filter_ignored(versions)?;
        let versions: Vec<Version> = match current {
            Some(current) => versions
                .into_iter()
                .filter(|v| v.semantic_cmp(current) == Ordering::Greater)
                .collect(),
            None => versions,
        };
        Ok(self.filter_ineligible(versions).into_iter().min())
    }

    /// Latest version, or the lowest security fix when vulnerable ranges are set
    pub fn select(
        &self,
        versions: &[Version],
        current: Option<&Version>,
    ) -> Result<Option<Version>, ResolverError> {
        if self.vulnerable.is_empty() {
            self.latest(versions)
        } else {
            self.lowest_security_fix(versions, current)
        }
    }
}
