//! Library ledger and feature resolution for rolls.
//!
//! Given a set of library directories, each described by name, version and
//! load paths, this crate:
//! - keeps a [`Ledger`] of every discovered version per library name and
//!   activates at most one of them, permanently
//! - finds files ([`Feature`]s) inside a [`Library`] by load path, legacy
//!   load path and suffix
//! - resolves load requests through the layered lookup of [`Resolver`]
//!   and hands located files to a host-supplied [`Evaluator`]
//!
//! Reading descriptor files is delegated to a [`MetadataProvider`].

pub mod error;
mod feature;
mod ledger;
mod library;
mod metadata;
mod options;
mod provider;
mod resolver;

pub use error::{LedgerError, LedgerResult, Requested};
pub use feature::Feature;
pub use ledger::{Entry, Ledger};
pub use library::{SUFFIXES, Library, has_known_suffix, has_parent_component};
pub use metadata::{DEFAULT_LOAD_PATH, LibraryMetadata, LoadPathSpec, MetadataRecord, Requirement};
pub use options::{FindOptions, LoadOptions, RequireOptions};
pub use provider::{MetadataProvider, StaticMetadata};
pub use resolver::{Evaluator, LoadStack, Resolver};

pub use rolls_version::{Constraint, Operator, Version};
