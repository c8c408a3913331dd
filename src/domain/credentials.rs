//! Registry and git credentials passed explicitly with each request

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A credential for one host
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Credential kind, e.g. `git_source` or `rubygems_server`
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Credential {
    pub fn new(kind: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            host: host.into(),
            username: None,
            password: None,
            token: None,
        }
    }

    /// Sets username and password (builder pattern)
    pub fn with_basic(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets a token (builder pattern)
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Username/password pair for HTTP basic auth.
    ///
    /// A bare token is sent as the username with an empty password, with the
    /// `x-access-token` user for git hosts.
    pub fn basic_auth(&self) -> Option<(String, String)> {
        match (&self.username, &self.password, &self.token) {
            (Some(user), password, _) => {
                Some((user.clone(), password.clone().unwrap_or_default()))
            }
            (None, _, Some(token)) if self.kind == "git_source" => {
                Some(("x-access-token".to_string(), token.clone()))
            }
            (None, _, Some(token)) => Some((token.clone(), String::new())),
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hidden = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &hidden(&self.password))
            .field("token", &hidden(&self.token))
            .finish()
    }
}

/// The credential list for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(Vec<Credential>);

impl Credentials {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self(credentials)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First credential whose host matches (case-insensitively)
    pub fn for_host(&self, host: &str) -> Option<&Credential> {
        self.0.iter().find(|c| c.host.eq_ignore_ascii_case(host))
    }

    /// Credential for the host of `url`, if the URL parses
    pub fn for_url(&self, url: &str) -> Option<&Credential> {
        let parsed = Url::parse(url).ok()?;
        self.for_host(parsed.host_str()?)
    }
}
