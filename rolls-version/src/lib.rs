//! Version numbers and version constraints for the rolls library ledger.
//!
//! This crate defines the two leaf types the resolution engine is built on:
//! - [`Version`]: an ordered tuple of numeric and textual segments where
//!   missing trailing segments compare as `0` (`1.2 == 1.2.0`)
//! - [`Constraint`]: an operator and a version parsed from the textual
//!   constraint grammar (`>= 1.0`, `~> 1.2`, `1.0+`, `2.0-`, `1.4~`)
//!
//! Both parse eagerly. Malformed input is reported at parse time and never
//! deferred to comparison time.

mod constraint;
mod version;

pub use constraint::{Constraint, Operator};
pub use version::{Segment, Version};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, VersionError>;

/// Errors raised while parsing versions and constraints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// The version string was empty or contained no segments.
    #[error("invalid version format: {0:?}")]
    Format(String),

    /// The constraint text does not follow the constraint grammar.
    #[error("invalid version constraint: {0:?}")]
    InvalidConstraint(String),
}
