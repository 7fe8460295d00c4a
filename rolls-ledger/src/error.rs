//! Error types for the ledger crate.

use crate::library::Library;
use rolls_version::{Constraint, VersionError};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Ledger and resolution errors.
///
/// A plain "no match" from a library-local lookup is never an error; these
/// are reserved for requests that named a specific library or version.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No ledger entry under this name.
    #[error("no such library -- {0}")]
    LibraryNotFound(String),

    /// An explicitly named library has no file matching the request.
    #[error("no such file to load -- {path}{}", in_library(.library))]
    FeatureNotFound {
        path: String,
        library: Option<String>,
    },

    /// Activation would replace an entity that is already fixed for the name.
    #[error("version conflict: {requested} vs. {existing}")]
    VersionConflict {
        existing: Arc<Library>,
        requested: Requested,
    },

    /// No candidate version satisfies the constraint.
    #[error("no library version -- {name} {constraint}")]
    VersionNotFound { name: String, constraint: Constraint },

    /// Library metadata is incomplete or inconsistent.
    #[error("validation error: {0}")]
    Validation(String),

    /// A library location must be an existing directory.
    #[error("not a directory -- {}", .0.display())]
    NotADirectory(PathBuf),

    /// The metadata provider could not describe a location.
    #[error("metadata error at {}: {message}", .location.display())]
    Metadata { location: PathBuf, message: String },

    /// The evaluator rejected a feature's content.
    #[error("evaluation of {} failed: {message}", .path.display())]
    Evaluation { path: PathBuf, message: String },

    /// Malformed version or constraint text.
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] globset::Error),
}

impl LedgerError {
    /// True for the two not-found variants, which callers commonly treat as
    /// a signal to fall back to another load mechanism.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::LibraryNotFound(_) | LedgerError::FeatureNotFound { .. }
        )
    }
}

fn in_library(library: &Option<String>) -> String {
    library
        .as_ref()
        .map(|name| format!(" (in {name})"))
        .unwrap_or_default()
}

/// The side of a [`LedgerError::VersionConflict`] that lost.
#[derive(Debug, Clone)]
pub enum Requested {
    /// Another entity of the same name asked to become active.
    Library(Arc<Library>),
    /// A constraint the active entity does not satisfy.
    Constraint(Constraint),
}

impl fmt::Display for Requested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requested::Library(library) => write!(f, "{library}"),
            Requested::Constraint(constraint) => write!(f, "constraint {constraint}"),
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
