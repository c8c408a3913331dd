//! Version constraints
//!
//! Used for requirement strings, ignore ranges and advisory ranges. The
//! clause grammar (`>= 1.0, < 2.0`, `~> 1.4`, `==1.2.*`) covers Bundler and
//! pip; Cargo requirements are parsed with `semver::VersionReq`.

use super::{Version, VersionScheme};
use crate::error::ResolverError;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(===|==|!=|~>|~=|>=|<=|>|<|=)?\s*(\S+)\s*$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Pessimistic,
    Arbitrary,
}

impl Operator {
    fn parse(op: Option<&str>) -> Self {
        match op {
            Some("!=") => Operator::NotEq,
            Some(">") => Operator::Gt,
            Some(">=") => Operator::Gte,
            Some("<") => Operator::Lt,
            Some("<=") => Operator::Lte,
            Some("~>") | Some("~=") => Operator::Pessimistic,
            Some("===") => Operator::Arbitrary,
            _ => Operator::Eq,
        }
    }
}

#[derive(Debug, Clone)]
struct Clause {
    op: Operator,
    version: Version,
    wildcard: bool,
}

impl Clause {
    fn parse(input: &str) -> Option<Self> {
        let caps = CLAUSE.captures(input)?;
        let op = Operator::parse(caps.get(1).map(|m| m.as_str()));
        let token = caps.get(2)?.as_str();

        let (token, wildcard) = match token.strip_suffix(".*") {
            Some(prefix) if matches!(op, Operator::Eq | Operator::NotEq) => (prefix, true),
            Some(_) => return None,
            None => (token, false),
        };

        let version = Version::parse(VersionScheme::Rubygems, token)?;
        Some(Self {
            op,
            version,
            wildcard,
        })
    }

    fn matches(&self, candidate: &Version) -> bool {
        let ord = candidate.semantic_cmp(&self.version);
        match self.op {
            Operator::Eq if self.wildcard => candidate.matches_prefix(&self.version),
            Operator::NotEq if self.wildcard => !candidate.matches_prefix(&self.version),
            Operator::Eq => ord == Ordering::Equal,
            Operator::NotEq => ord != Ordering::Equal,
            Operator::Gt => ord == Ordering::Greater,
            Operator::Gte => ord != Ordering::Less,
            Operator::Lt => ord == Ordering::Less,
            Operator::Lte => ord != Ordering::Greater,
            Operator::Pessimistic => {
                ord != Ordering::Less
                    && candidate.semantic_cmp(&self.version.bump()) == Ordering::Less
            }
            Operator::Arbitrary => candidate.as_str() == self.version.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
enum ConstraintKind {
    Any,
    Clauses(Vec<Clause>),
    Semver(semver::VersionReq),
}

/// A parsed version constraint
#[derive(Debug, Clone)]
pub struct Constraint {
    raw: String,
    kind: ConstraintKind,
}

impl Constraint {
    /// Parse an ignore or advisory range.
    ///
    /// The clause grammar is tried first; Cargo ranges fall back to
    /// `semver::VersionReq`.
    pub fn parse_range(scheme: VersionScheme, input: &str) -> Result<Self, ResolverError> {
        if let Some(constraint) = Self::parse_any(input) {
            return Ok(constraint);
        }
        if let Some(clauses) = parse_clauses(input) {
            return Ok(Self::from_clauses(input, clauses));
        }
        match scheme {
            VersionScheme::Semver => Self::parse_semver(input),
            VersionScheme::Rubygems => Err(ResolverError::invalid_constraint(
                input,
                "unrecognized constraint",
            )),
        }
    }

    /// Parse a manifest requirement string.
    ///
    /// Cargo requirements use Cargo's own semantics (`1.2` means `^1.2`).
    pub fn parse_requirement(scheme: VersionScheme, input: &str) -> Result<Self, ResolverError> {
        if let Some(constraint) = Self::parse_any(input) {
            return Ok(constraint);
        }
        match scheme {
            VersionScheme::Semver => Self::parse_semver(input),
            VersionScheme::Rubygems => parse_clauses(input)
                .map(|clauses| Self::from_clauses(input, clauses))
                .ok_or_else(|| ResolverError::invalid_constraint(input, "unrecognized constraint")),
        }
    }

    /// Exact-version constraint (`= version`)
    pub fn exact(version: &Version) -> Self {
        Self {
            raw: format!("= {}", version),
            kind: ConstraintKind::Clauses(vec![Clause {
                op: Operator::Eq,
                version: version.clone(),
                wildcard: false,
            }]),
        }
    }

    fn parse_any(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        (trimmed.is_empty() || trimmed == "*" || trimmed == ">= 0").then(|| Self {
            raw: trimmed.to_string(),
            kind: ConstraintKind::Any,
        })
    }

    fn parse_semver(input: &str) -> Result<Self, ResolverError> {
        semver::VersionReq::parse(input.trim())
            .map(|req| Self {
                raw: input.trim().to_string(),
                kind: ConstraintKind::Semver(req),
            })
            .map_err(|e| ResolverError::invalid_constraint(input, e))
    }

    fn from_clauses(input: &str, clauses: Vec<Clause>) -> Self {
        Self {
            raw: input.trim().to_string(),
            kind: ConstraintKind::Clauses(clauses),
        }
    }

    /// Whether `version` satisfies this constraint
    pub fn matches(&self, version: &Version) -> bool {
        match &self.kind {
            ConstraintKind::Any => true,
            ConstraintKind::Clauses(clauses) => clauses.iter().all(|c| c.matches(version)),
            ConstraintKind::Semver(req) => match version.semver() {
                Some(v) => req.matches(v),
                None => semver::Version::parse(version.as_str())
                    .map(|v| req.matches(&v))
                    .unwrap_or(false),
            },
        }
    }

    /// Whether the constraint mentions a pre-release version
    pub fn has_prerelease(&self) -> bool {
        match &self.kind {
            ConstraintKind::Any => false,
            ConstraintKind::Clauses(clauses) => clauses.iter().any(|c| c.version.is_prerelease()),
            ConstraintKind::Semver(req) => req.comparators.iter().any(|c| !c.pre.is_empty()),
        }
    }

    /// The constraint as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn parse_clauses(input: &str) -> Option<Vec<Clause>> {
    let parts: Vec<&str> = input.split(',').collect();
    if parts.iter().any(|p| p.trim().is_empty()) {
        return None;
    }
    parts.into_iter().map(Clause::parse).collect()
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
