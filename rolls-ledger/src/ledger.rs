//! The library ledger.
//!
//! Maps each library name to either the list of discovered candidate
//! versions or the single version that has been activated. Activation is the
//! only transition and it cannot be undone.

use crate::error::{LedgerError, LedgerResult, Requested};
use crate::feature::Feature;
use crate::library::Library;
use crate::metadata::Requirement;
use crate::options::FindOptions;
use crate::provider::{MetadataProvider, StaticMetadata};
use globset::GlobBuilder;
use indexmap::IndexMap;
use rolls_version::Constraint;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// State of one ledger name.
#[derive(Debug, Clone)]
pub enum Entry {
    /// Discovered versions, none chosen yet. Kept in insertion order.
    Candidates(Vec<Arc<Library>>),
    /// The version fixed for the rest of the ledger's life.
    Active(Arc<Library>),
}

impl Entry {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Entry::Active(_))
    }

    /// The active library, if any.
    #[must_use]
    pub fn active(&self) -> Option<&Arc<Library>> {
        match self {
            Entry::Active(library) => Some(library),
            Entry::Candidates(_) => None,
        }
    }

    /// Every library held by the entry.
    #[must_use]
    pub fn libraries(&self) -> &[Arc<Library>] {
        match self {
            Entry::Active(library) => std::slice::from_ref(library),
            Entry::Candidates(list) => list,
        }
    }

    /// Candidates sorted newest first; the active library alone otherwise.
    /// Ties keep insertion order.
    fn newest_first(&self) -> Vec<Arc<Library>> {
        let mut libraries = self.libraries().to_vec();
        libraries.sort_by(|a, b| b.version().cmp(a.version()));
        libraries
    }
}

/// Registry of discovered libraries.
pub struct Ledger {
    table: IndexMap<String, Entry>,
    provider: Box<dyn MetadataProvider + Send + Sync>,
}

impl Ledger {
    /// Creates an empty ledger that reads metadata through `provider`.
    pub fn new(provider: impl MetadataProvider + Send + Sync + 'static) -> Self {
        Self {
            table: IndexMap::new(),
            provider: Box::new(provider),
        }
    }

    // ── Population ──────────────────────────────────────────────

    /// Adds the library at `location`, logging and skipping it if its
    /// metadata cannot be read or it conflicts with an existing candidate.
    pub fn add_location(&mut self, location: impl AsRef<Path>) -> Option<Arc<Library>> {
        let location = location.as_ref();
        match self.try_add_location(location) {
            Ok(library) => library,
            Err(e) => {
                warn!(path = %location.display(), error = %e, "Skipping library location");
                None
            }
        }
    }

    /// Adds the library at `location`, returning any failure.
    ///
    /// Returns `Ok(None)` for libraries whose metadata marks them omitted.
    pub fn try_add_location(&mut self, location: impl AsRef<Path>) -> LedgerResult<Option<Arc<Library>>> {
        let location = location.as_ref();
        let metadata = self.provider.metadata(location)?;
        if metadata.is_omitted() {
            debug!(path = %location.display(), name = %metadata.name(), "Library omitted");
            return Ok(None);
        }
        let library = Library::new(location, metadata)?;
        self.add_library(Arc::new(library)).map(Some)
    }

    /// Enters an already built library as a candidate.
    ///
    /// Adding a library equal to an existing candidate returns the existing
    /// one. A different location claiming the same name and version is a
    /// conflict. Once a name is active, further candidates are ignored.
    pub fn add_library(&mut self, library: Arc<Library>) -> LedgerResult<Arc<Library>> {
        let entry = self
            .table
            .entry(library.name().to_string())
            .or_insert_with(|| Entry::Candidates(Vec::new()));

        match entry {
            Entry::Active(active) => {
                debug!(
                    name = %library.name(),
                    version = %library.version(),
                    active = %active.version(),
                    "Library already active, candidate ignored"
                );
                Ok(library)
            }
            Entry::Candidates(list) => {
                if let Some(existing) = list.iter().find(|c| c.version() == library.version()) {
                    if **existing == *library {
                        return Ok(Arc::clone(existing));
                    }
                    return Err(LedgerError::VersionConflict {
                        existing: Arc::clone(existing),
                        requested: Requested::Library(library),
                    });
                }
                debug!(name = %library.name(), version = %library.version(), "Library added");
                list.push(Arc::clone(&library));
                Ok(library)
            }
        }
    }

    /// Adds every location, skipping failures. Returns how many locations
    /// yielded a library.
    pub fn prime<I, P>(&mut self, locations: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let added = locations
            .into_iter()
            .filter_map(|location| self.add_location(location))
            .count();
        info!(added, names = self.table.len(), "Ledger primed");
        added
    }

    // ── Queries ─────────────────────────────────────────────────

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.table.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Library names in the order they were first seen.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.table.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// The active library for `name`, if one has been chosen.
    #[must_use]
    pub fn active(&self, name: &str) -> Option<&Arc<Library>> {
        self.table.get(name).and_then(Entry::active)
    }

    #[must_use]
    pub fn is_active(&self, name: &str) -> bool {
        self.active(name).is_some()
    }

    // ── Activation ──────────────────────────────────────────────

    /// Activates `name`, optionally constrained by constraint text.
    pub fn activate(&mut self, name: &str, constraint: Option<&str>) -> LedgerResult<Arc<Library>> {
        let constraint = constraint.map(Constraint::parse).transpose()?;
        self.activate_with(name, constraint.as_ref())
    }

    /// Activates `name`.
    ///
    /// An already active library is returned as is when it satisfies the
    /// constraint; otherwise the call fails with a version conflict and the
    /// ledger is left untouched. For candidates, the newest satisfying
    /// version becomes active.
    pub fn activate_with(
        &mut self,
        name: &str,
        constraint: Option<&Constraint>,
    ) -> LedgerResult<Arc<Library>> {
        let entry = self
            .table
            .get_mut(name)
            .ok_or_else(|| LedgerError::LibraryNotFound(name.to_string()))?;

        match entry {
            Entry::Active(active) => match constraint {
                Some(c) if !c.matches(active.version()) => Err(LedgerError::VersionConflict {
                    existing: Arc::clone(active),
                    requested: Requested::Constraint(c.clone()),
                }),
                _ => Ok(Arc::clone(active)),
            },
            Entry::Candidates(list) => {
                // `max_by` keeps the last of equal elements, so reverse to
                // let the first inserted candidate win ties.
                let chosen = list
                    .iter()
                    .filter(|lib| constraint.is_none_or(|c| c.matches(lib.version())))
                    .rev()
                    .max_by(|a, b| a.version().cmp(b.version()))
                    .cloned()
                    .ok_or_else(|| LedgerError::VersionNotFound {
                        name: name.to_string(),
                        constraint: constraint.cloned().unwrap_or_else(Constraint::any),
                    })?;
                info!(
                    name = %name,
                    version = %chosen.version(),
                    path = %chosen.location().display(),
                    "Library activated"
                );
                *entry = Entry::Active(Arc::clone(&chosen));
                Ok(chosen)
            }
        }
    }

    /// Makes `library` the active entity for its name.
    ///
    /// Idempotent for the library that is already active; any other active
    /// library of the same name is a conflict.
    pub fn activate_library(&mut self, library: &Arc<Library>) -> LedgerResult<Arc<Library>> {
        let entry = self
            .table
            .entry(library.name().to_string())
            .or_insert_with(|| Entry::Candidates(Vec::new()));

        match entry {
            Entry::Active(active) if **active == **library => Ok(Arc::clone(active)),
            Entry::Active(active) => Err(LedgerError::VersionConflict {
                existing: Arc::clone(active),
                requested: Requested::Library(Arc::clone(library)),
            }),
            Entry::Candidates(_) => {
                info!(
                    name = %library.name(),
                    version = %library.version(),
                    path = %library.location().display(),
                    "Library activated"
                );
                *entry = Entry::Active(Arc::clone(library));
                Ok(Arc::clone(library))
            }
        }
    }

    /// Like [`activate`](Self::activate), but an unknown name is `Ok(None)`.
    pub fn instance(
        &mut self,
        name: &str,
        constraint: Option<&str>,
    ) -> LedgerResult<Option<Arc<Library>>> {
        if !self.contains(name) {
            return Ok(None);
        }
        self.activate(name, constraint).map(Some)
    }

    /// Narrows the candidates of `name` to those satisfying `constraint`
    /// without activating anything.
    ///
    /// Fails, leaving the entry unchanged, when no candidate remains or the
    /// active library does not satisfy the constraint.
    pub fn constrain(&mut self, name: &str, constraint: &str) -> LedgerResult<()> {
        let constraint = Constraint::parse(constraint)?;
        let entry = self
            .table
            .get_mut(name)
            .ok_or_else(|| LedgerError::LibraryNotFound(name.to_string()))?;

        match entry {
            Entry::Active(active) if constraint.matches(active.version()) => Ok(()),
            Entry::Active(active) => Err(LedgerError::VersionConflict {
                existing: Arc::clone(active),
                requested: Requested::Constraint(constraint),
            }),
            Entry::Candidates(list) => {
                let kept: Vec<_> = list
                    .iter()
                    .filter(|lib| constraint.matches(lib.version()))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    return Err(LedgerError::VersionNotFound {
                        name: name.to_string(),
                        constraint,
                    });
                }
                debug!(name = %name, constraint = %constraint, remaining = kept.len(), "Candidates constrained");
                *list = kept;
                Ok(())
            }
        }
    }

    /// Activates the requirements of `library`, and theirs in turn.
    /// Development requirements are included only when `development` is set,
    /// and only for `library` itself.
    ///
    /// Returns every library activated along the way, `library` first.
    pub fn activate_requirements(
        &mut self,
        library: &Arc<Library>,
        development: bool,
    ) -> LedgerResult<Vec<Arc<Library>>> {
        let mut seen: Vec<Arc<Library>> = vec![Arc::clone(library)];
        let mut queue: Vec<(Arc<Library>, bool)> = vec![(Arc::clone(library), development)];

        while let Some((current, development)) = queue.pop() {
            let requirements: Vec<Requirement> = current
                .metadata()
                .requirements(!development)
                .cloned()
                .collect();
            for requirement in requirements {
                let dependency = self.activate_with(&requirement.name, requirement.constraint.as_ref())?;
                if !seen.contains(&dependency) {
                    seen.push(Arc::clone(&dependency));
                    queue.push((dependency, false));
                }
            }
        }
        Ok(seen)
    }

    /// Activates `name` with its runtime requirements, then drops every
    /// entry that is still inactive.
    pub fn isolate(&mut self, name: &str, constraint: Option<&str>) -> LedgerResult<Arc<Library>> {
        let library = self.activate(name, constraint)?;
        self.activate_requirements(&library, false)?;
        let before = self.table.len();
        self.table.retain(|_, entry| entry.is_active());
        info!(name = %name, dropped = before - self.table.len(), "Ledger isolated");
        Ok(library)
    }

    /// Requirements of `library` that no ledger entry can satisfy.
    #[must_use]
    pub fn missing_requirements(&self, library: &Library, development: bool) -> Vec<Requirement> {
        library
            .metadata()
            .requirements(!development)
            .filter(|req| {
                self.table.get(&req.name).is_none_or(|entry| {
                    !entry.libraries().iter().any(|lib| req.accepts(lib.version()))
                })
            })
            .cloned()
            .collect()
    }

    // ── Search ──────────────────────────────────────────────────

    /// First match for `path` across the whole ledger.
    ///
    /// Active libraries are searched first, then candidates newest first
    /// (only the newest when `latest_only`). Only declared load paths are
    /// searched. A match equal to `skip` is passed over.
    pub fn brute_force_find(
        &self,
        path: &str,
        options: &FindOptions,
        skip: Option<&Feature>,
    ) -> Option<Feature> {
        let options = main_only(options);
        self.search_order(options.latest_only)
            .into_iter()
            .filter_map(|library| library.find(path, &options))
            .find(|feature| skip != Some(feature))
    }

    /// Every match for `path` across the ledger, deduplicated, in the order
    /// [`brute_force_find`](Self::brute_force_find) would try them.
    pub fn brute_force_search_all(
        &self,
        path: &str,
        options: &FindOptions,
        skip: Option<&Feature>,
    ) -> Vec<Feature> {
        let options = main_only(options);
        let mut seen = HashSet::new();
        self.search_order(options.latest_only)
            .into_iter()
            .filter_map(|library| library.find(path, &options))
            .filter(|feature| skip != Some(feature))
            .filter(|feature| seen.insert(feature.clone()))
            .collect()
    }

    /// Absolute paths under each declared load path matching `pattern`.
    ///
    /// The pattern is relative to the load path; `*` does not cross `/`
    /// while `**` does. Directories match as well as files.
    pub fn glob(&self, pattern: &str, latest_only: bool) -> LedgerResult<Vec<PathBuf>> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();

        let mut matches = Vec::new();
        for library in self.search_order(latest_only) {
            for root in library.absolute_load_paths() {
                if !root.is_dir() {
                    continue;
                }
                for entry in WalkDir::new(&root)
                    .min_depth(1)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(Result::ok)
                {
                    if let Ok(relative) = entry.path().strip_prefix(&root) {
                        if matcher.is_match(relative) {
                            matches.push(entry.into_path());
                        }
                    }
                }
            }
        }
        Ok(matches)
    }

    /// Active libraries in insertion order, then each candidate list
    /// newest first.
    fn search_order(&self, latest_only: bool) -> Vec<Arc<Library>> {
        let active = self.table.values().filter_map(Entry::active).cloned();
        let candidates = self
            .table
            .values()
            .filter(|entry| !entry.is_active())
            .flat_map(|entry| {
                let mut list = entry.newest_first();
                if latest_only {
                    list.truncate(1);
                }
                list
            });
        active.chain(candidates).collect()
    }
}

fn main_only(options: &FindOptions) -> FindOptions {
    FindOptions {
        main_only: true,
        ..options.clone()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(StaticMetadata::new())
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger").field("table", &self.table).finish_non_exhaustive()
    }
}
