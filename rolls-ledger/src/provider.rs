//! Metadata providers.
//!
//! Reading descriptor files is the host's business. The ledger only needs
//! something that turns a library directory into [`LibraryMetadata`].

use crate::error::{LedgerError, LedgerResult};
use crate::metadata::LibraryMetadata;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Describes the library rooted at a directory.
pub trait MetadataProvider {
    /// Returns the metadata for `location`, or an error if the directory
    /// does not hold a conforming library.
    fn metadata(&self, location: &Path) -> LedgerResult<LibraryMetadata>;
}

impl<F> MetadataProvider for F
where
    F: Fn(&Path) -> LedgerResult<LibraryMetadata>,
{
    fn metadata(&self, location: &Path) -> LedgerResult<LibraryMetadata> {
        self(location)
    }
}

/// In-memory provider keyed by location. Used by hosts that already hold
/// parsed descriptors, and by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    entries: HashMap<PathBuf, LibraryMetadata>,
}

impl StaticMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers metadata for a location, replacing any previous entry.
    pub fn insert(&mut self, location: impl Into<PathBuf>, metadata: LibraryMetadata) {
        self.entries.insert(location.into(), metadata);
    }

    #[must_use]
    pub fn with(mut self, location: impl Into<PathBuf>, metadata: LibraryMetadata) -> Self {
        self.insert(location, metadata);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MetadataProvider for StaticMetadata {
    fn metadata(&self, location: &Path) -> LedgerResult<LibraryMetadata> {
        self.entries
            .get(location)
            .cloned()
            .ok_or_else(|| LedgerError::Metadata {
                location: location.to_path_buf(),
                message: "no metadata registered".into(),
            })
    }
}
