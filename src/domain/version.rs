//! Version values and their ecosystem-specific ordering
//!
//! Two grammars are supported:
//! - Rubygems-style segment versions (`1.5.0`, `1.10.0.beta`, `1.4.0rc1`),
//!   also used for pip's PEP 440-style versions
//! - Semantic Versioning via the `semver` crate (Cargo)
//!
//! In both grammars pre-release versions sort below their release.

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

static SEGMENTED_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+(?:\.[0-9A-Za-z]+)*(?:-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$").unwrap()
});

static SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+|[A-Za-z]+").unwrap());

/// Version grammar of an ecosystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionScheme {
    /// Dotted segments, letters mark pre-releases
    Rubygems,
    /// Semantic Versioning 2.0
    Semver,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Number(u64),
    Text(String),
}

fn cmp_segment(a: &Segment, b: &Segment) -> Ordering {
    match (a, b) {
        (Segment::Number(x), Segment::Number(y)) => x.cmp(y),
        (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
        (Segment::Number(_), Segment::Text(_)) => Ordering::Greater,
        (Segment::Text(_), Segment::Number(_)) => Ordering::Less,
    }
}

fn cmp_segments(a: &[Segment], b: &[Segment]) -> Ordering {
    let zero = Segment::Number(0);
    for i in 0..a.len().max(b.len()) {
        let left = a.get(i).unwrap_or(&zero);
        let right = b.get(i).unwrap_or(&zero);
        match cmp_segment(left, right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn scan_segments(input: &str) -> Option<Vec<Segment>> {
    let normalized = input.replace('-', ".pre.");
    SEGMENT
        .find_iter(&normalized)
        .map(|m| {
            let text = m.as_str();
            if text.as_bytes()[0].is_ascii_digit() {
                text.parse().ok().map(Segment::Number)
            } else {
                Some(Segment::Text(text.to_ascii_lowercase()))
            }
        })
        .collect()
}

fn strip_v_prefix(input: &str) -> &str {
    match input.strip_prefix(['v', 'V']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => input,
    }
}

/// A parsed version
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
    semver: Option<semver::Version>,
}

impl Version {
    /// Parse a version string in the given grammar.
    ///
    /// Returns `None` when the string is not a valid version.
    pub fn parse(scheme: VersionScheme, input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let stripped = strip_v_prefix(trimmed);

        match scheme {
            VersionScheme::Rubygems => {
                if !SEGMENTED_VERSION.is_match(stripped) {
                    return None;
                }
                Some(Self {
                    raw: trimmed.to_string(),
                    segments: scan_segments(stripped)?,
                    semver: None,
                })
            }
            VersionScheme::Semver => {
                let parsed = semver::Version::parse(stripped).ok()?;
                let without_build = stripped.split('+').next().unwrap_or(stripped);
                Some(Self {
                    raw: trimmed.to_string(),
                    segments: scan_segments(without_build)?,
                    semver: Some(parsed),
                })
            }
        }
    }

    /// The version string as supplied
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this is a pre-release version
    pub fn is_prerelease(&self) -> bool {
        match &self.semver {
            Some(v) => !v.pre.is_empty(),
            None => self
                .segments
                .iter()
                .any(|s| matches!(s, Segment::Text(_))),
        }
    }

    /// Compare by precedence only (`1.0` equals `1.0.0`)
    pub fn semantic_cmp(&self, other: &Version) -> Ordering {
        match (&self.semver, &other.semver) {
            (Some(a), Some(b)) => (a.major, a.minor, a.patch)
                .cmp(&(b.major, b.minor, b.patch))
                .then_with(|| a.pre.cmp(&b.pre)),
            _ => cmp_segments(&self.segments, &other.segments),
        }
    }

    /// Whether both versions have the same precedence
    pub fn same_precedence(&self, other: &Version) -> bool {
        self.semantic_cmp(other) == Ordering::Equal
    }

    /// Upper bound of a pessimistic (`~>` / `~=`) constraint.
    ///
    /// Drops pre-release segments, then the last release segment (when more
    /// than one remains), and increments the new last segment.
    pub fn bump(&self) -> Version {
        let mut release: Vec<u64> = self
            .segments
            .iter()
            .map_while(|s| match s {
                Segment::Number(n) => Some(*n),
                Segment::Text(_) => None,
            })
            .collect();
        if release.len() > 1 {
            release.pop();
        }
        match release.last_mut() {
            Some(last) => *last += 1,
            None => release.push(1),
        }

        let raw = release
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Version {
            raw,
            segments: release.into_iter().map(Segment::Number).collect(),
            semver: None,
        }
    }

    /// Whether the leading segments of this version equal all segments of `prefix`
    pub(crate) fn matches_prefix(&self, prefix: &Version) -> bool {
        let zero = Segment::Number(0);
        prefix.segments.iter().enumerate().all(|(i, seg)| {
            cmp_segment(self.segments.get(i).unwrap_or(&zero), seg) == Ordering::Equal
        })
    }

    pub(crate) fn semver(&self) -> Option<&semver::Version> {
        self.semver.as_ref()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Precedence first, then the literal string so the order is total
        self.semantic_cmp(other)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gem(s: &str) -> Version {
        Version::parse(VersionScheme::Rubygems, s).unwrap()
    }

    fn sv(s: &str) -> Version {
        Version::parse(VersionScheme::Semver, s).unwrap()
    }

    #[test]
    fn test_parse_rubygems() {
        assert_eq!(gem("1.5.0").as_str(), "1.5.0");
        assert_eq!(gem(" 1.3 ").as_str(), "1.3");
        assert!(Version::parse(VersionScheme::Rubygems, "1.10.0.beta").is_some());
        assert!(Version::parse(VersionScheme::Rubygems, "1.4.0rc1").is_some());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse(VersionScheme::Rubygems, "rubbish").is_none());
        assert!(Version::parse(VersionScheme::Rubygems, "").is_none());
        assert!(Version::parse(VersionScheme::Rubygems, "1..2").is_none());
        assert!(
            Version::parse(VersionScheme::Rubygems, "a1b78a929dac93a52f08db4f2847d76d6cfe39bd")
                .is_none()
        );
        assert!(Version::parse(VersionScheme::Semver, "1.3").is_none());
    }

    #[test]
    fn test_v_prefix_is_stripped() {
        assert!(gem("v1.0.0").same_precedence(&gem("1.0.0")));
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(gem("1.9.0") < gem("1.10.0"));
        assert!(gem("10.0.0") > gem("9.0.0"));
        assert!(gem("1.4.0") < gem("1.5.0"));
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        assert!(gem("1.5.0.a") < gem("1.5.0"));
        assert!(gem("1.6.0.beta") < gem("1.6.0"));
        assert!(gem("1.6.0.beta") > gem("1.5.0"));
        assert!(gem("1.4.0rc1") < gem("1.4.0"));
        assert!(gem("1.0.0-alpha") < gem("1.0.0-beta"));
    }

    #[test]
    fn test_is_prerelease() {
        assert!(gem("1.10.0.beta").is_prerelease());
        assert!(gem("1.4.0.rc1").is_prerelease());
        assert!(!gem("1.9.0").is_prerelease());
        assert!(sv("1.0.0-beta.1").is_prerelease());
        assert!(!sv("1.0.0").is_prerelease());
    }

    #[test]
    fn test_trailing_zeros_have_same_precedence() {
        assert!(gem("1.3").same_precedence(&gem("1.3.0")));
        // Total order still separates the literal strings
        assert_ne!(gem("1.3"), gem("1.3.0"));
    }

    #[test]
    fn test_semver_ordering() {
        assert!(sv("1.0.0-alpha") < sv("1.0.0-alpha.1"));
        assert!(sv("1.0.0-rc.1") < sv("1.0.0"));
        assert!(sv("1.2.3") < sv("1.10.0"));
        assert!(sv("1.0.0+build1").same_precedence(&sv("1.0.0+build2")));
    }

    #[test]
    fn test_mixed_grammar_comparison() {
        assert!(sv("1.5.0") > gem("1.5.0.a"));
        assert!(sv("1.6.0") > gem("1.5.9"));
    }

    #[test]
    fn test_bump() {
        assert_eq!(gem("1.4.0.rc1").bump().as_str(), "1.5");
        assert_eq!(gem("1.4").bump().as_str(), "2");
        assert_eq!(gem("2").bump().as_str(), "3");
        assert_eq!(gem("1.4.5").bump().as_str(), "1.5");
    }

    #[test]
    fn test_matches_prefix() {
        assert!(gem("1.2.7").matches_prefix(&gem("1.2")));
        assert!(!gem("1.3.0").matches_prefix(&gem("1.2")));
    }

    #[test]
    fn test_sorting() {
        let mut versions = vec![gem("1.5.0"), gem("1.3.0"), gem("1.10.0.beta"), gem("1.4.0")];
        versions.sort();
        let sorted: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
        assert_eq!(sorted, vec!["1.3.0", "1.4.0", "1.5.0", "1.10.0.beta"]);
    }

    #[test]
    fn test_serialize_as_string() {
        assert_eq!(serde_json::to_string(&gem("1.5.0")).unwrap(), "\"1.5.0\"");
    }
}
