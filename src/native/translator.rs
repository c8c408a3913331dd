//! Translation of raw helper failures into domain errors
//!
//! Helpers report failures as an error class tag plus free text. The text
//! comes from third-party tools and its wording drifts between releases, so
//! the recognized shapes live in one ordered table. Bump
//! `TRANSLATION_TABLE_VERSION` whenever a signature is added or changed.

use super::{FailureKind, HelperFailure};
use crate::error::ResolverError;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

/// Revision of the signature table
pub const TRANSLATION_TABLE_VERSION: u32 = 1;

/// What the failing helper call was doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureContext {
    /// Listing versions from a private registry
    RegistryListing { registry: String, dependency: String },
    /// Resolving the full dependency graph for a dependency
    GraphResolution { dependency: String },
}

impl FailureContext {
    fn dependency(&self) -> &str {
        match self {
            FailureContext::RegistryListing { dependency, .. }
            | FailureContext::GraphResolution { dependency } => dependency,
        }
    }
}

type Builder = fn(&Captures<'_>, &FailureContext) -> ResolverError;

/// One recognized failure shape
struct Signature {
    id: &'static str,
    /// Substring of the error class; ignored when the helper sent no class
    class: Option<&'static str>,
    pattern: Regex,
    build: Builder,
}

impl Signature {
    fn new(id: &'static str, class: Option<&'static str>, pattern: &str, build: Builder) -> Self {
        Self {
            id,
            class,
            pattern: Regex::new(pattern).unwrap(),
            build,
        }
    }

    fn class_matches(&self, error_class: Option<&str>) -> bool {
        match (self.class, error_class) {
            (Some(expected), Some(actual)) => actual.contains(expected),
            _ => true,
        }
    }
}

static SIGNATURES: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    vec![
        Signature::new(
            "auth_required",
            Some("AuthenticationRequiredError"),
            r"Authentication is required for (?P<source>\S+?)\.?(?:\s|$)",
            |caps, _| ResolverError::authentication_failure(&caps["source"]),
        ),
        Signature::new(
            "bad_auth",
            Some("BadAuthenticationError"),
            r"Bad username or password for (?P<source>\S+?)\.?(?:\s|$)",
            |caps, _| ResolverError::authentication_failure(&caps["source"]),
        ),
        Signature::new(
            "fetch_failed",
            Some("HTTPError"),
            r"Could not fetch specs from (?P<source>\S+?)\.?(?:\s|$)",
            |caps, _| ResolverError::timed_out(&caps["source"]),
        ),
        Signature::new(
            "missing_ref",
            None,
            r"Revision \S+ does not exist in the repository (?P<url>\S+?)\.?(?:\s|$)",
            |caps, context| {
                let dependency = dependency_from_url(&caps["url"])
                    .unwrap_or_else(|| context.dependency().to_string());
                ResolverError::reference_not_found(dependency)
            },
        ),
        Signature::new(
            "git_unreachable",
            None,
            r"git clone(?:\s+-\S+)*\s+(?P<url>\S+)",
            |caps, _| {
                let url = caps["url"].trim_matches(|c| c == '\'' || c == '"');
                let url = url.strip_prefix("git+").unwrap_or(url);
                ResolverError::git_not_reachable(vec![strip_vcs_ref(url).to_string()])
            },
        ),
        Signature::new(
            "no_matching_version",
            None,
            r"(?:Could not find a version that matches|No matching distribution found for) (?P<package>[^\s,;(=<>!~\[]+)(?P<rest>[^\n]*)",
            |caps, _| {
                ResolverError::not_resolvable(format!(
                    "Could not find a version that matches {}{}",
                    &caps["package"], &caps["rest"]
                ))
            },
        ),
    ]
});

/// Drops a `#fragment` and a trailing `@ref` from a VCS URL
fn strip_vcs_ref(url: &str) -> &str {
    let url = url.split(['#', '?']).next().unwrap_or(url);
    match (url.rfind('@'), url.rfind('/')) {
        (Some(at), Some(slash)) if at > slash => &url[..at],
        _ => url,
    }
}

/// Name a git URL would install as: `#egg=` wins, then the repository basename
fn dependency_from_url(url: &str) -> Option<String> {
    if let Some((_, fragment)) = url.split_once("#egg=") {
        let name = fragment.split('&').next().unwrap_or(fragment);
        return (!name.is_empty()).then(|| name.to_string());
    }
    let base = strip_vcs_ref(url).trim_end_matches('/').rsplit('/').next()?;
    let base = base.strip_suffix(".git").unwrap_or(base);
    (!base.is_empty()).then(|| base.to_string())
}

/// Maps a helper failure to a domain error.
///
/// Signatures are tried in order; the first match wins. Anything
/// unrecognized becomes `DependencyFileNotResolvable` with the helper's
/// message kept verbatim.
pub fn translate(failure: &HelperFailure, context: &FailureContext) -> ResolverError {
    match failure.kind {
        FailureKind::Setup => {
            return ResolverError::io(
                "failed to run native helper",
                std::io::Error::other(failure.message.clone()),
            )
        }
        FailureKind::Timeout => {
            return match context {
                FailureContext::RegistryListing { registry, .. } => {
                    ResolverError::timed_out(registry.clone())
                }
                FailureContext::GraphResolution { .. } => {
                    ResolverError::not_resolvable(failure.message.clone())
                }
            }
        }
        FailureKind::Reported | FailureKind::Crashed { .. } => {}
    }

    let error_class = failure.error_class.as_deref();
    for signature in SIGNATURES.iter() {
        if !signature.class_matches(error_class) {
            continue;
        }
        if let Some(caps) = signature.pattern.captures(&failure.message) {
            debug!(
                target: "native",
                signature = signature.id,
                table_version = TRANSLATION_TABLE_VERSION,
                "translated helper failure"
            );
            return (signature.build)(&caps, context);
        }
    }

    debug!(
        target: "native",
        error_class = error_class.unwrap_or("-"),
        "unrecognized helper failure"
    );
    ResolverError::not_resolvable(failure.message.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> FailureContext {
        FailureContext::RegistryListing {
            registry: "https://repo.fury.io/greysteil/".to_string(),
            dependency: "business".to_string(),
        }
    }

    fn graph() -> FailureContext {
        FailureContext::GraphResolution {
            dependency: "boto3".to_string(),
        }
    }

    fn reported(class: &str, message: &str) -> HelperFailure {
        HelperFailure::reported(Some(class.to_string()), message)
    }

    #[test]
    fn test_authentication_required_names_host() {
        let failure = reported(
            "Bundler::Fetcher::AuthenticationRequiredError",
            "Authentication is required for repo.fury.io.\nPlease supply credentials for this source. You can do this by running:\n  bundle config repo.fury.io username:password\n",
        );
        match translate(&failure, &listing()) {
            ResolverError::PrivateSourceAuthenticationFailure { registry } => {
                assert_eq!(registry, "repo.fury.io")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_bad_authentication_keeps_full_url() {
        let failure = reported(
            "Bundler::Fetcher::BadAuthenticationError",
            "Bad username or password for https://SECRET_CODES@repo.fury.io/greysteil/.\nPlease double-check your credentials and correct them.\n",
        );
        match translate(&failure, &listing()) {
            ResolverError::PrivateSourceAuthenticationFailure { registry } => {
                assert_eq!(registry, "https://SECRET_CODES@repo.fury.io/greysteil/")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_fetch_failure_is_timed_out() {
        let failure = reported(
            "Bundler::HTTPError",
            "Could not fetch specs from https://repo.fury.io/greysteil/\n",
        );
        match translate(&failure, &listing()) {
            ResolverError::PrivateSourceTimedOut { registry } => {
                assert_eq!(registry, "https://repo.fury.io/greysteil/")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_class_mismatch_skips_signature() {
        let failure = reported(
            "Bundler::GemNotFound",
            "Could not fetch specs from https://repo.fury.io/greysteil/",
        );
        assert!(matches!(
            translate(&failure, &listing()),
            ResolverError::DependencyFileNotResolvable { .. }
        ));
    }

    #[test]
    fn test_unreachable_git_dependency() {
        let failure = reported(
            "subprocess.CalledProcessError",
            "Command 'git clone -q https://github.com/greysteil/unreachable /tmp/pip-req-build-x' returned non-zero exit status 128.",
        );
        match translate(&failure, &graph()) {
            ResolverError::GitDependenciesNotReachable { dependency_urls } => {
                assert_eq!(dependency_urls, vec!["https://github.com/greysteil/unreachable"])
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_git_dependency_strips_vcs_prefix() {
        let failure = HelperFailure::crashed(
            Some(1),
            "Running command git clone --filter=blob:none --quiet git+https://github.com/x/private.git#egg=private /tmp/y",
        );
        match translate(&failure, &graph()) {
            ResolverError::GitDependenciesNotReachable { dependency_urls } => {
                assert_eq!(dependency_urls, vec!["https://github.com/x/private.git"])
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_ref_names_other_dependency() {
        let failure = reported(
            "pip._internal.exceptions.InstallationError",
            "Did not find branch or tag 'master-does-not-exist', assuming revision or ref. Revision master-does-not-exist does not exist in the repository https://github.com/sarugaku/pythonfinder.git#egg=pythonfinder",
        );
        match translate(&failure, &graph()) {
            ResolverError::GitDependencyReferenceNotFound { dependency } => {
                assert_eq!(dependency, "pythonfinder")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_no_matching_version_names_package() {
        let failure = reported(
            "pip._internal.exceptions.DistributionNotFound",
            "ERROR: Could not find a version that matches boto3==1.9.27,>=1.9.28 (from -r requirements/test.in (line 1))\nTried: 1.9.27, 1.9.28",
        );
        let err = translate(&failure, &graph());
        assert!(matches!(err, ResolverError::DependencyFileNotResolvable { .. }));
        assert!(err
            .to_string()
            .starts_with("Could not find a version that matches boto3==1.9.27"));
    }

    #[test]
    fn test_no_matching_distribution_is_normalized() {
        let failure = reported(
            "pip._internal.exceptions.DistributionNotFound",
            "No matching distribution found for jupyter-server>=9",
        );
        let err = translate(&failure, &graph());
        assert!(err
            .to_string()
            .starts_with("Could not find a version that matches jupyter-server"));
    }

    #[test]
    fn test_unrecognized_failure_is_verbatim() {
        let failure = reported("RuntimeError", "something odd happened");
        let err = translate(&failure, &graph());
        assert_eq!(err.to_string(), "something odd happened");
    }

    #[test]
    fn test_timeout_depends_on_context() {
        let failure = HelperFailure::timeout("helper timed out after 300 seconds");
        assert!(matches!(
            translate(&failure, &listing()),
            ResolverError::PrivateSourceTimedOut { ref registry } if registry == "https://repo.fury.io/greysteil/"
        ));
        assert!(matches!(
            translate(&failure, &graph()),
            ResolverError::DependencyFileNotResolvable { .. }
        ));
    }

    #[test]
    fn test_setup_failure_is_io() {
        let failure = HelperFailure::setup("failed to start pip-native-helper");
        let err = translate(&failure, &graph());
        assert!(matches!(err, ResolverError::Io { .. }));
        assert!(!err.is_domain_error());
    }

    #[test]
    fn test_dependency_from_url() {
        assert_eq!(
            dependency_from_url("https://github.com/x/pythonfinder.git").as_deref(),
            Some("pythonfinder")
        );
        assert_eq!(
            dependency_from_url("git+https://github.com/x/repo@v1#egg=other").as_deref(),
            Some("other")
        );
        assert_eq!(
            dependency_from_url("https://github.com/x/business/").as_deref(),
            Some("business")
        );
        assert_eq!(
            dependency_from_url("https://token@github.com/x/business@v1.2").as_deref(),
            Some("business")
        );
    }
}
