//! Library metadata: name, version, load paths, release date, requirements.
//!
//! Metadata is produced once by a [`MetadataProvider`](crate::MetadataProvider)
//! and treated as read-only by the resolution engine. The `with_*` helpers
//! exist for programmatic construction.

use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use rolls_version::{Constraint, Version};
use serde::{Deserialize, Serialize};

/// Load path used when a library declares none.
pub const DEFAULT_LOAD_PATH: &str = "lib";

/// A dependency of a library on another library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Name of the required library.
    pub name: String,
    /// Acceptable versions; `None` accepts any.
    #[serde(default, rename = "version", skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    /// Needed only for development (tests, tooling), not at runtime.
    #[serde(default)]
    pub development: bool,
}

impl Requirement {
    /// A runtime requirement, e.g. `Requirement::runtime("ansi", Some("~> 1.4"))`.
    pub fn runtime(name: impl Into<String>, constraint: Option<&str>) -> LedgerResult<Self> {
        Ok(Self {
            name: name.into(),
            constraint: constraint.map(Constraint::parse).transpose()?,
            development: false,
        })
    }

    /// A development-only requirement.
    pub fn development(name: impl Into<String>, constraint: Option<&str>) -> LedgerResult<Self> {
        Ok(Self {
            development: true,
            ..Self::runtime(name, constraint)?
        })
    }

    /// Does `version` satisfy this requirement?
    #[must_use]
    pub fn accepts(&self, version: &Version) -> bool {
        self.constraint.as_ref().is_none_or(|c| c.matches(version))
    }
}

/// Validated library metadata.
///
/// Name and version are always present; construction through
/// [`MetadataRecord`] fails with [`LedgerError::Validation`] otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetadataRecord")]
pub struct LibraryMetadata {
    name: String,
    version: Version,
    #[serde(rename = "load_path")]
    load_paths: Vec<String>,
    #[serde(rename = "date", skip_serializing_if = "Option::is_none")]
    released: Option<DateTime<Utc>>,
    requirements: Vec<Requirement>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    omit: bool,
}

impl LibraryMetadata {
    /// Creates metadata with the default load path and no requirements.
    pub fn new(name: impl Into<String>, version: Version) -> LedgerResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::Validation("library name is required".into()));
        }
        Ok(Self {
            name,
            version,
            load_paths: vec![DEFAULT_LOAD_PATH.to_string()],
            released: None,
            requirements: Vec::new(),
            omit: false,
        })
    }

    /// Parses the version text and creates metadata.
    pub fn parse(name: impl Into<String>, version: &str) -> LedgerResult<Self> {
        Self::new(name, Version::parse(version)?)
    }

    /// Replaces the load paths; an empty list restores the default.
    #[must_use]
    pub fn with_load_paths<I, S>(mut self, load_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load_paths = load_paths.into_iter().map(Into::into).collect();
        if self.load_paths.is_empty() {
            self.load_paths.push(DEFAULT_LOAD_PATH.to_string());
        }
        self
    }

    /// Replaces the load paths from a delimited list such as `"lib, ext"`.
    /// Commas, semicolons, colons and whitespace all separate entries.
    #[must_use]
    pub fn with_load_path_str(self, load_paths: &str) -> Self {
        let paths: Vec<String> = split_load_paths(load_paths);
        self.with_load_paths(paths)
    }

    #[must_use]
    pub fn with_released(mut self, released: DateTime<Utc>) -> Self {
        self.released = Some(released);
        self
    }

    #[must_use]
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    #[must_use]
    pub fn with_omit(mut self, omit: bool) -> Self {
        self.omit = omit;
        self
    }

    /// Library name, unique per ledger entry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Load paths relative to the library location, in declared order.
    #[must_use]
    pub fn load_paths(&self) -> &[String] {
        &self.load_paths
    }

    #[must_use]
    pub fn released(&self) -> Option<&DateTime<Utc>> {
        self.released.as_ref()
    }

    /// Requirements, leaving out development ones when `runtime_only`.
    pub fn requirements(&self, runtime_only: bool) -> impl Iterator<Item = &Requirement> {
        self.requirements
            .iter()
            .filter(move |req| !(runtime_only && req.development))
    }

    pub fn runtime_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements(true)
    }

    pub fn development_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(|req| req.development)
    }

    /// Omitted libraries are never entered into a ledger.
    #[must_use]
    pub fn is_omitted(&self) -> bool {
        self.omit
    }
}

/// Unvalidated metadata as read from a descriptor. Every field is optional
/// so that providers can deserialize partial records and leave validation to
/// the `TryFrom` conversion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataRecord {
    pub name: Option<String>,
    pub version: Option<Version>,
    #[serde(default, alias = "loadpath", alias = "load_paths")]
    pub load_path: Option<LoadPathSpec>,
    #[serde(default, alias = "released")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub omit: bool,
}

/// Load paths written either as a list or as one delimited string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoadPathSpec {
    List(Vec<String>),
    Text(String),
}

impl TryFrom<MetadataRecord> for LibraryMetadata {
    type Error = LedgerError;

    fn try_from(record: MetadataRecord) -> LedgerResult<Self> {
        let name = record
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| LedgerError::Validation("non-conforming library (missing name)".into()))?;
        let version = record.version.ok_or_else(|| {
            LedgerError::Validation(format!("non-conforming library (missing version) -- {name}"))
        })?;

        let mut metadata = Self::new(name, version)?.with_omit(record.omit);
        metadata = match record.load_path {
            Some(LoadPathSpec::List(paths)) => metadata.with_load_paths(paths),
            Some(LoadPathSpec::Text(text)) => metadata.with_load_path_str(&text),
            None => metadata,
        };
        metadata.released = record.date;
        metadata.requirements = record.requirements;
        Ok(metadata)
    }
}

fn split_load_paths(text: &str) -> Vec<String> {
    text.split([',', ';', ':', ' ', '\t', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
