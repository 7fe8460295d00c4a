//! Loadable files inside a library.

use crate::error::LedgerResult;
use crate::library::Library;
use crate::options::LoadOptions;
use crate::resolver::{Evaluator, Resolver};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A resolved file: owning library, load path, relative name and the
/// suffix that matched.
///
/// Two features are equal when they resolve to the same absolute path.
#[derive(Clone)]
pub struct Feature {
    library: Option<Arc<Library>>,
    load_path: String,
    filename: String,
    extension: Option<String>,
    full_path: PathBuf,
}

impl Feature {
    pub(crate) fn new(
        library: Arc<Library>,
        load_path: &str,
        filename: &str,
        extension: Option<&str>,
    ) -> Self {
        let full_path = library
            .location()
            .join(load_path)
            .join(format!("{filename}{}", extension.unwrap_or_default()));
        Self {
            library: Some(library),
            load_path: load_path.to_string(),
            filename: filename.to_string(),
            extension: extension.map(String::from),
            full_path,
        }
    }

    /// A feature outside any library, e.g. a file the host located itself.
    /// Loading it never activates anything.
    #[must_use]
    pub fn standalone(path: impl Into<PathBuf>) -> Self {
        let full_path: PathBuf = path.into();
        let filename = full_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            library: None,
            load_path: String::new(),
            filename,
            extension: None,
            full_path,
        }
    }

    #[must_use]
    pub fn library(&self) -> Option<&Arc<Library>> {
        self.library.as_ref()
    }

    #[must_use]
    pub fn library_name(&self) -> Option<&str> {
        self.library.as_deref().map(Library::name)
    }

    #[must_use]
    pub fn load_path(&self) -> &str {
        &self.load_path
    }

    /// Path relative to the load path, as requested.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Absolute path: `location/load_path/filename+extension`.
    #[must_use]
    pub fn resolve(&self) -> &Path {
        &self.full_path
    }

    /// Filename with its matched extension.
    #[must_use]
    pub fn local_name(&self) -> String {
        format!("{}{}", self.filename, self.extension.as_deref().unwrap_or_default())
    }

    /// Evaluates the feature's content through `evaluator`.
    ///
    /// Returns `Ok(false)` without touching the load stack when
    /// `require_once` is set and the feature was already evaluated in the
    /// same scope. Otherwise the feature is pushed onto the load stack for
    /// the duration of the call, its library is activated (unless `force`)
    /// and the file content handed to the evaluator.
    pub fn load(
        &self,
        resolver: &mut Resolver,
        evaluator: &mut dyn Evaluator,
        options: &LoadOptions,
    ) -> LedgerResult<bool> {
        let scope = options.scope.as_deref();
        if options.require_once && resolver.is_loaded(self, scope) {
            debug!(path = %self.full_path.display(), "Already loaded in scope");
            return Ok(false);
        }

        let mut frame = resolver.enter(self.clone());
        if !options.force {
            if let Some(library) = &self.library {
                frame.ledger_mut().activate_library(library)?;
            }
        }

        let content = std::fs::read(&self.full_path)?;
        frame.mark_loaded(self, scope);
        debug!(path = %self.full_path.display(), scope = ?scope, "Evaluating feature");
        if let Err(err) = evaluator.evaluate(&mut frame, self, &content, scope) {
            frame.unmark_loaded(self, scope);
            return Err(err);
        }
        Ok(true)
    }
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.full_path == other.full_path
    }
}

impl Eq for Feature {}

impl Hash for Feature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_path.hash(state);
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path.display())
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("library", &self.library_name())
            .field("path", &self.full_path)
            .finish()
    }
}
