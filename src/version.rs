// src/version.rs

//! Version ordering and dependency constraints
//!
//! Upstream versions are compared semver-style when both sides are valid
//! semver, otherwise segment by segment: runs of digits compare
//! numerically, runs of letters lexically, and a numeric segment sorts
//! after an alphabetic one (`1.0a < 1.0.1`).
//!
//! Build dependencies are parsed from the three native syntaxes:
//! - Debian: `foo (>= 1.2)`, `foo (>> 1.2)`
//! - RPM: `foo >= 1.2`
//! - Arch: `foo>=1.2`

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// A package or upstream version string with version ordering
#[derive(Debug, Clone, Eq)]
pub struct Version(String);

impl Version {
    /// Parse a version string
    ///
    /// Versions must be non-empty and contain no whitespace.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.contains(char::is_whitespace) {
            return Err(Error::InvalidVersion(format!("'{s}'")));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare two versions
    pub fn compare(&self, other: &Version) -> Ordering {
        match (semver::Version::parse(&self.0), semver::Version::parse(&other.0)) {
            (Ok(v1), Ok(v2)) => v1.cmp(&v2),
            _ => compare_segments(&self.0, &other.0),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Num(u64),
    Alpha(&'a str),
}

/// Split a version into numeric and alphabetic runs, dropping separators
fn segments(s: &str) -> Vec<Segment<'_>> {
    let mut segs = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        if bytes[i].is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            // overlong numbers saturate rather than fail
            segs.push(Segment::Num(s[start..i].parse().unwrap_or(u64::MAX)));
        } else if bytes[i].is_ascii_alphabetic() {
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            segs.push(Segment::Alpha(&s[start..i]));
        } else {
            i += 1;
        }
    }
    segs
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    let (sa, sb) = (segments(a), segments(b));
    for (x, y) in sa.iter().zip(sb.iter()) {
        let ord = match (x, y) {
            (Segment::Num(x), Segment::Num(y)) => x.cmp(y),
            (Segment::Alpha(x), Segment::Alpha(y)) => x.cmp(y),
            (Segment::Num(_), Segment::Alpha(_)) => Ordering::Greater,
            (Segment::Alpha(_), Segment::Num(_)) => Ordering::Less,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    sa.len().cmp(&sb.len())
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Version constraint operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Exact version match
    Exact(Version),
    /// Greater than
    GreaterThan(Version),
    /// Greater than or equal
    GreaterOrEqual(Version),
    /// Less than
    LessThan(Version),
    /// Less than or equal
    LessOrEqual(Version),
    /// Not equal
    NotEqual(Version),
}

impl VersionConstraint {
    /// Parse a version constraint such as `>= 1.2.3` or `>> 1.0`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        // two-char operators first
        let ops: [(&str, fn(Version) -> Self); 9] = [
            (">=", Self::GreaterOrEqual),
            ("<=", Self::LessOrEqual),
            ("!=", Self::NotEqual),
            (">>", Self::GreaterThan),
            ("<<", Self::LessThan),
            ("==", Self::Exact),
            (">", Self::GreaterThan),
            ("<", Self::LessThan),
            ("=", Self::Exact),
        ];
        for (op, make) in ops {
            if let Some(rest) = s.strip_prefix(op) {
                return Ok(make(Version::parse(rest)?));
            }
        }
        // No operator means exact match
        Ok(Self::Exact(Version::parse(s)?))
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version == v,
            Self::GreaterThan(v) => version > v,
            Self::GreaterOrEqual(v) => version >= v,
            Self::LessThan(v) => version < v,
            Self::LessOrEqual(v) => version <= v,
            Self::NotEqual(v) => version != v,
        }
    }

    fn parts(&self) -> (&'static str, &Version) {
        match self {
            Self::Exact(v) => ("=", v),
            Self::GreaterThan(v) => (">", v),
            Self::GreaterOrEqual(v) => (">=", v),
            Self::LessThan(v) => ("<", v),
            Self::LessOrEqual(v) => ("<=", v),
            Self::NotEqual(v) => ("!=", v),
        }
    }

    /// Constraint in Debian relation syntax (`>> 1.0` rather than `> 1.0`)
    pub fn to_deb(&self) -> String {
        let (op, v) = self.parts();
        let op = match op {
            ">" => ">>",
            "<" => "<<",
            op => op,
        };
        format!("{op} {v}")
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (op, v) = self.parts();
        write!(f, "{op} {v}")
    }
}

/// A build dependency: package name with an optional version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub constraint: Option<VersionConstraint>,
}

impl Dependency {
    /// Parse a dependency in Debian, RPM or Arch syntax
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || Error::ParsingFailed(format!("invalid dependency: '{s}'"));

        // Debian: name (op ver), optionally followed by [arch] or <profile>
        if let Some((name, rest)) = s.split_once('(')
            && rest.trim_start().starts_with(['<', '>', '=', '!'])
        {
            let inner = rest.split_once(')').map(|(c, _)| c).ok_or_else(bad)?;
            let name = name.trim();
            if name.is_empty() {
                return Err(bad());
            }
            return Ok(Self {
                name: strip_arch_qualifier(name).to_string(),
                constraint: Some(VersionConstraint::parse(inner).map_err(|_| bad())?),
            });
        }

        // RPM / Arch: name [op ver]
        let split = s.find(['<', '>', '=', '!']);
        let (name, constraint) = match split {
            Some(pos) => {
                let constraint = VersionConstraint::parse(&s[pos..]).map_err(|_| bad())?;
                (s[..pos].trim(), Some(constraint))
            }
            None => (s, None),
        };
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(bad());
        }
        Ok(Self {
            name: strip_arch_qualifier(name).to_string(),
            constraint,
        })
    }

    /// The dependency with any version qualifier removed
    pub fn name_only(&self) -> Self {
        Self {
            name: self.name.clone(),
            constraint: None,
        }
    }

    /// Dependency in Debian relation syntax, as accepted by `apt-get satisfy`
    pub fn to_deb(&self) -> String {
        match &self.constraint {
            Some(c) => format!("{} ({})", self.name, c.to_deb()),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(c) => write!(f, "{} {}", self.name, c),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Drop a Debian `:any`/`:native` multiarch qualifier
fn strip_arch_qualifier(name: &str) -> &str {
    if name.contains('(') {
        return name;
    }
    name.split_once(':').map_or(name, |(n, _)| n)
}
