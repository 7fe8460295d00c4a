//! Segmented version numbers.
//!
//! A version is a tuple of segments split from its textual form on any
//! non-alphanumeric character. Purely numeric tokens become
//! [`Segment::Number`] (or [`Segment::BigNumber`] past `u64::MAX`), anything
//! else stays a [`Segment::Text`].

use crate::{Result, VersionError};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// One component of a version number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Number(u64),
    /// A numeric segment too large for `u64`, kept as its decimal digits
    /// without leading zeros.
    BigNumber(String),
    Text(String),
}

static ZERO: Segment = Segment::Number(0);

impl Segment {
    fn from_token(token: &str) -> Self {
        if token.bytes().all(|b| b.is_ascii_digit()) {
            return match token.parse() {
                Ok(n) => Segment::Number(n),
                Err(_) => Segment::BigNumber(token.trim_start_matches('0').to_string()),
            };
        }
        Segment::Text(token.to_string())
    }

    /// Returns the numeric value, if this is a numeric segment that fits
    /// in a `u64`.
    #[must_use]
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Segment::Number(n) => Some(*n),
            Segment::BigNumber(_) | Segment::Text(_) => None,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Segment::Text(_))
    }

    fn is_zero(&self) -> bool {
        matches!(self, Segment::Number(0))
    }

    fn incremented(&self) -> Segment {
        match self {
            Segment::Number(n) => match n.checked_add(1) {
                Some(next) => Segment::Number(next),
                None => Segment::BigNumber(increment_digits(&n.to_string())),
            },
            Segment::BigNumber(digits) => Segment::BigNumber(increment_digits(digits)),
            Segment::Text(_) => self.clone(),
        }
    }
}

/// Adds one to a decimal digit string.
fn increment_digits(digits: &str) -> String {
    let mut bytes = digits.as_bytes().to_vec();
    for b in bytes.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    format!("1{}", String::from_utf8_lossy(&bytes))
}

impl Ord for Segment {
    /// Textual segments sort before numeric ones, so `1.0.beta < 1.0.0`.
    /// A big number always exceeds a `u64` one.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => a.cmp(b),
            (Segment::BigNumber(a), Segment::BigNumber(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            (Segment::Number(_), Segment::BigNumber(_)) => Ordering::Less,
            (Segment::BigNumber(_), Segment::Number(_)) => Ordering::Greater,
            (Segment::Text(_), _) => Ordering::Less,
            (_, Segment::Text(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Number(n) => write!(f, "{n}"),
            Segment::BigNumber(s) | Segment::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Segment {
    fn from(n: u64) -> Self {
        Segment::Number(n)
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::from_token(s)
    }
}

/// An immutable version number.
///
/// Comparison pads the shorter version with zero segments, so equality,
/// ordering and hashing all treat `1.2` and `1.2.0` as the same version.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<Segment>,
}

impl Version {
    /// Parses a version from its textual form, e.g. `"1.2.3"` or `"2.0-rc1"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<Segment> = raw
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(Segment::from_token)
            .collect();

        if segments.is_empty() {
            return Err(VersionError::Format(raw.to_string()));
        }
        Ok(Self { segments })
    }

    /// Builds a version from explicit segments.
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(VersionError::Format(String::new()));
        }
        Ok(Self { segments })
    }

    /// The version `0`.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            segments: vec![Segment::Number(0)],
        }
    }

    /// Builds a version from separately stored components, as found in
    /// descriptor formats that keep `major`, `minor`, `patch` and `build`
    /// as distinct fields.
    pub fn from_parts(major: u64, minor: u64, patch: u64, build: Option<&str>) -> Result<Self> {
        let mut segments = vec![
            Segment::Number(major),
            Segment::Number(minor),
            Segment::Number(patch),
        ];
        if let Some(build) = build {
            segments.extend(
                build
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .filter(|token| !token.is_empty())
                    .map(Segment::from_token),
            );
        }
        Self::new(segments)
    }

    /// Returns the segments as declared, without zero padding.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of declared segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; a version has at least one segment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the segment at `index`, or `0` past the end.
    #[must_use]
    pub fn segment(&self, index: usize) -> &Segment {
        self.segments.get(index).unwrap_or(&ZERO)
    }

    #[must_use]
    pub fn major(&self) -> &Segment {
        self.segment(0)
    }

    #[must_use]
    pub fn minor(&self) -> &Segment {
        self.segment(1)
    }

    #[must_use]
    pub fn patch(&self) -> &Segment {
        self.segment(2)
    }

    /// Segments after `patch`, joined with `.`. Empty when there are none.
    #[must_use]
    pub fn build(&self) -> String {
        self.segments
            .iter()
            .skip(3)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Exclusive upper bound of the pessimistic range starting at `self`.
    ///
    /// The last non-zero numeric segment is incremented and everything after
    /// it dropped: `1.2` gives `1.3`, `1.2.3` gives `1.2.4`, `1.0` gives `2`.
    /// An all-zero version bumps its last numeric segment (`0.0` gives `0.1`).
    /// Returns `None` when there is no numeric segment to bump.
    #[must_use]
    pub fn pessimistic_upper_bound(&self) -> Option<Version> {
        let index = self
            .segments
            .iter()
            .rposition(|s| s.is_numeric() && !s.is_zero())
            .or_else(|| self.segments.iter().rposition(Segment::is_numeric))?;

        let mut segments = self.segments[..index].to_vec();
        segments.push(self.segments[index].incremented());
        Some(Version { segments })
    }

    /// Pessimistic match: `self` lies in `[base, base.pessimistic_upper_bound())`.
    #[must_use]
    pub fn is_compatible_with(&self, base: &Version) -> bool {
        if self < base {
            return false;
        }
        match base.pessimistic_upper_bound() {
            Some(upper) => *self < upper,
            None => true,
        }
    }

    /// Checks this version against constraint text such as `">= 1.0"`.
    ///
    /// Fails with [`VersionError::InvalidConstraint`] if the text is malformed.
    pub fn satisfies(&self, constraint: &str) -> Result<bool> {
        let constraint = crate::Constraint::parse(constraint)?;
        Ok(constraint.matches(self))
    }

    fn normalized(&self) -> &[Segment] {
        let end = self
            .segments
            .iter()
            .rposition(|s| !s.is_zero())
            .map_or(0, |i| i + 1);
        &self.segments[..end]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.segments.len().max(other.segments.len());
        (0..width)
            .map(|i| self.segment(i).cmp(other.segment(i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(VersionVisitor)
    }
}

/// Accepts strings as well as bare numbers, since hand-written descriptors
/// often carry `version: 1.2` unquoted.
struct VersionVisitor;

impl Visitor<'_> for VersionVisitor {
    type Value = Version;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a version string such as \"1.2.3\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Version, E> {
        Version::parse(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Version, E> {
        Ok(Version {
            segments: vec![Segment::Number(v)],
        })
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Version, E> {
        let v = u64::try_from(v).map_err(|_| E::custom(format!("negative version {v}")))?;
        self.visit_u64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Version, E> {
        Version::parse(&v.to_string()).map_err(E::custom)
    }
}
