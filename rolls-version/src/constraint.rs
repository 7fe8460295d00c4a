//! Version constraints.
//!
//! Grammar, after trimming surrounding whitespace:
//!
//! ```text
//! constraint := number "~" | number "+" | number "-" | [op] ws* number
//! op         := "=~" | "~>" | "<=" | ">=" | "==" | "=" | "<" | ">"
//! number     := digits ( ("." | "-") word )*
//! ```
//!
//! `~>` and a trailing `~` are the pessimistic operator, `=` is `==`, a
//! trailing `+` means `>=` and a trailing `-` means `<`. A bare number is an
//! exact match.

use crate::{Result, Version, VersionError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Comparison applied by a [`Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    /// "Compatible with": at least the given version, below the next
    /// increment of its last significant segment.
    Pessimistic,
}

impl Operator {
    /// Canonical spelling of the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Pessimistic => "=~",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest spellings first so `<=` is not read as `<` followed by `=1.0`.
const OPERATORS: &[(&str, Operator)] = &[
    ("=~", Operator::Pessimistic),
    ("~>", Operator::Pessimistic),
    ("<=", Operator::Le),
    (">=", Operator::Ge),
    ("==", Operator::Eq),
    ("=", Operator::Eq),
    ("<", Operator::Lt),
    (">", Operator::Gt),
];

/// A parsed version constraint.
#[derive(Debug, Clone)]
pub struct Constraint {
    operator: Operator,
    version: Version,
    text: String,
}

impl Constraint {
    /// Parses constraint text, failing with [`VersionError::InvalidConstraint`].
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let invalid = || VersionError::InvalidConstraint(text.to_string());

        let (operator, number) = if let Some(number) = trimmed.strip_suffix('~') {
            (Operator::Pessimistic, number)
        } else if let Some(number) = trimmed.strip_suffix('+') {
            (Operator::Ge, number)
        } else if let Some(number) = trimmed.strip_suffix('-') {
            (Operator::Lt, number)
        } else {
            OPERATORS
                .iter()
                .find_map(|(spelling, op)| trimmed.strip_prefix(spelling).map(|rest| (*op, rest)))
                .unwrap_or((Operator::Eq, trimmed))
        };

        let number = number.trim();
        if !is_version_number(number) {
            return Err(invalid());
        }
        let version = Version::parse(number).map_err(|_| invalid())?;

        Ok(Self {
            operator,
            version,
            text: trimmed.to_string(),
        })
    }

    /// Builds a constraint from its parts.
    #[must_use]
    pub fn new(operator: Operator, version: Version) -> Self {
        let text = format!("{operator} {version}");
        Self {
            operator,
            version,
            text,
        }
    }

    /// The constraint every version satisfies (`>= 0`).
    #[must_use]
    pub fn any() -> Self {
        Self {
            operator: Operator::Ge,
            version: Version::zero(),
            text: "0+".to_string(),
        }
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Does `candidate` satisfy this constraint?
    #[must_use]
    pub fn matches(&self, candidate: &Version) -> bool {
        match self.operator {
            Operator::Eq => *candidate == self.version,
            Operator::Lt => *candidate < self.version,
            Operator::Gt => *candidate > self.version,
            Operator::Le => *candidate <= self.version,
            Operator::Ge => *candidate >= self.version,
            Operator::Pessimistic => candidate.is_compatible_with(&self.version),
        }
    }

    /// Renders the constraint the way gem tooling spells it (`~>` rather
    /// than `=~`).
    #[must_use]
    pub fn to_gem_string(&self) -> String {
        let op = match self.operator {
            Operator::Pessimistic => "~>",
            other => other.as_str(),
        };
        format!("{op} {}", self.version)
    }
}

/// `digits ( ("." | "-") word )*`
fn is_version_number(s: &str) -> bool {
    let mut pieces = s.split(['.', '-']);
    let head_ok = pieces
        .next()
        .is_some_and(|head| !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()));
    head_ok && pieces.all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'))
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator && self.version == other.version
    }
}

impl Eq for Constraint {}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Constraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Constraint::parse(&text).map_err(serde::de::Error::custom)
    }
}
