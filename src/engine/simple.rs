//! Registry-and-filter resolution shared by every ecosystem

use super::ResolutionContext;
use crate::domain::{Constraint, LatestVersion, Version, VersionSource};
use crate::error::ResolverError;
use tracing::debug;

pub(super) async fn latest_version(
    context: &ResolutionContext,
) -> Result<Option<LatestVersion>, ResolverError> {
    let source = context.source();
    match &source {
        VersionSource::Path { .. } => {
            debug!(target: "engine", %source, "path dependency has no newer version");
            Ok(None)
        }
        VersionSource::Git(git) => {
            let sha = context
                .registry()
                .fetch_commit_sha(&context.dependency().name, git, context.credentials())
                .await?;
            Ok(Some(sha.into()))
        }
        VersionSource::Default | VersionSource::Registry { .. } => {
            let (versions, filter) = context.candidates(&source).await?;
            Ok(filter.latest(&versions)?.map(LatestVersion::from))
        }
    }
}

pub(super) async fn lowest_security_fix_version(
    context: &ResolutionContext,
) -> Result<Option<Version>, ResolverError> {
    let source = context.source();
    if source.is_git() || source.is_path() {
        debug!(target: "engine", %source, "no security fix for non-registry source");
        return Ok(None);
    }

    let (versions, filter) = context.candidates(&source).await?;
    let filter = filter.with_vulnerable(context.vulnerable_ranges()?);
    filter.lowest_security_fix(&versions, context.current_version().as_ref())
}

/// The candidate satisfies every declared requirement
pub(super) fn is_resolvable(
    context: &ResolutionContext,
    candidate: &Version,
) -> Result<bool, ResolverError> {
    for requirement in context.dependency().requirement_strings() {
        let constraint = Constraint::parse_requirement(context.scheme(), requirement)?;
        if !constraint.matches(candidate) {
            debug!(target: "engine", %candidate, requirement, "candidate outside requirement");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Highest filtered version inside `requirement`
pub(super) async fn latest_resolvable_version(
    context: &ResolutionContext,
    requirement: &str,
) -> Result<Option<Version>, ResolverError> {
    let constraint = Constraint::parse_requirement(context.scheme(), requirement)?;
    let source = context.source();
    if source.is_git() || source.is_path() {
        return Ok(None);
    }

    let (versions, filter) = context.candidates(&source).await?;
    Ok(filter
        .filter(&versions)?
        .into_iter()
        .filter(|v| constraint.matches(v))
        .max())
}
