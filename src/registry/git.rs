//! Git remote lookups
//!
//! Resolves a branch (or the remote's `HEAD`) to a commit SHA with
//! `git ls-remote`. No clone is made.

use crate::domain::{CommitSha, Credentials, GitSource};
use crate::error::ResolverError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

/// Default timeout for git network operations
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Lists the refs of a remote repository
#[async_trait]
pub trait GitRemote: Send + Sync {
    /// Raw `git ls-remote` output for `url`.
    ///
    /// Failures to reach the remote are reported as
    /// `GitDependenciesNotReachable` naming `url`.
    async fn ls_remote(&self, url: &str, credentials: &Credentials)
        -> Result<String, ResolverError>;
}

/// `GitRemote` backed by the git binary
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: String,
    timeout: Duration,
}

impl SystemGit {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new("git", DEFAULT_GIT_TIMEOUT)
    }
}

#[async_trait]
impl GitRemote for SystemGit {
    async fn ls_remote(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<String, ResolverError> {
        let remote = authenticated_url(url, credentials);
        debug!(
            target: "git",
            "Executing command: {} ls-remote {}",
            self.program,
            crate::error::redact_credentials(&remote)
        );

        let output = Command::new(&self.program)
            .arg("ls-remote")
            .arg(&remote)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.timeout, output).await {
            Ok(result) => {
                result.map_err(|e| ResolverError::io(format!("failed to run {}", self.program), e))?
            }
            Err(_) => {
                warn!(
                    target: "git",
                    "Command timed out after {} seconds: git ls-remote {}",
                    self.timeout.as_secs(),
                    crate::error::redact_credentials(url)
                );
                return Err(ResolverError::git_not_reachable(vec![url.to_string()]));
            }
        };

        if !output.status.success() {
            debug!(
                target: "git",
                "Command failed with exit code: {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(ResolverError::git_not_reachable(vec![url.to_string()]));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Embeds the matching credential into an HTTPS URL.
///
/// Other schemes, and URLs without a matching credential, are returned as-is.
pub fn authenticated_url(url: &str, credentials: &Credentials) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if parsed.scheme() != "https" || !parsed.username().is_empty() {
        return url.to_string();
    }
    let Some((user, password)) = parsed
        .host_str()
        .and_then(|host| credentials.for_host(host))
        .and_then(|c| c.basic_auth())
    else {
        return url.to_string();
    };

    if parsed.set_username(&user).is_err() || parsed.set_password(Some(&password)).is_err() {
        return url.to_string();
    }
    parsed.to_string()
}

/// Parses `git ls-remote` output into `(sha, ref)` pairs
pub fn parse_ls_remote(output: &str) -> Vec<(&str, &str)> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some((parts.next()?, parts.next()?))
        })
        .collect()
}

/// Finds the commit a ref name points to.
///
/// Branches win over tags; annotated tags resolve to the tagged commit.
pub fn find_ref(output: &str, name: &str) -> Option<CommitSha> {
    let refs = parse_ls_remote(output);
    let candidates = if name == "HEAD" {
        vec!["HEAD".to_string()]
    } else {
        vec![
            name.to_string(),
            format!("refs/heads/{}", name),
            format!("refs/tags/{}^{{}}", name),
            format!("refs/tags/{}", name),
        ]
    };

    candidates.iter().find_map(|wanted| {
        refs.iter()
            .find(|(_, r)| *r == wanted.as_str())
            .and_then(|(sha, _)| CommitSha::parse(sha))
    })
}

/// Latest commit on the source's branch (or remote `HEAD`).
///
/// A pinned ref is ignored: the branch is what moves.
pub async fn latest_commit(
    remote: &dyn GitRemote,
    source: &GitSource,
    dependency_name: &str,
    credentials: &Credentials,
) -> Result<CommitSha, ResolverError> {
    let source = source.unpinned();
    let output = remote.ls_remote(&source.url, credentials).await?;

    find_ref(&output, source.target_ref()).ok_or_else(|| {
        debug!(
            target: "git",
            dependency = dependency_name,
            reference = source.target_ref(),
            "ref not found on remote"
        );
        ResolverError::reference_not_found(dependency_name)
    })
}
