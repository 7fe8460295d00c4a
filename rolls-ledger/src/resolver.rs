//! Feature resolution and loading.
//!
//! The [`Resolver`] owns everything a load request touches: the ledger, the
//! stack of features currently being evaluated, the request cache and the
//! per-scope record of evaluated files. Hosts create one per resolution
//! context and pass it to every call; a multi-threaded host wraps it in a
//! mutex.

use crate::error::{LedgerError, LedgerResult};
use crate::feature::Feature;
use crate::ledger::Ledger;
use crate::library::{Library, has_parent_component};
use crate::options::{FindOptions, LoadOptions, RequireOptions};
use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Executes located features. Supplied by the host.
pub trait Evaluator {
    /// Evaluates `content`, read from `feature`, within `scope`.
    ///
    /// The resolver is handed back so nested requests made by the evaluated
    /// code see `feature` on top of the load stack.
    fn evaluate(
        &mut self,
        resolver: &mut Resolver,
        feature: &Feature,
        content: &[u8],
        scope: Option<&str>,
    ) -> LedgerResult<()>;

    /// Called when no library provides `request`. Hosts with a load
    /// mechanism of their own hook in here; returns whether anything was
    /// newly loaded.
    fn fallback(
        &mut self,
        resolver: &mut Resolver,
        request: &str,
        options: &LoadOptions,
    ) -> LedgerResult<bool> {
        let _ = (resolver, options);
        Err(LedgerError::FeatureNotFound {
            path: request.to_string(),
            library: None,
        })
    }
}

/// Features currently being evaluated, innermost last.
#[derive(Debug, Clone, Default)]
pub struct LoadStack(Vec<Feature>);

impl LoadStack {
    /// The feature being evaluated right now.
    #[must_use]
    pub fn top(&self) -> Option<&Feature> {
        self.0.last()
    }

    #[must_use]
    pub fn contains(&self, feature: &Feature) -> bool {
        self.0.contains(feature)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Outermost first.
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.0.iter()
    }
}

/// Resolution context.
#[derive(Debug, Default)]
pub struct Resolver {
    ledger: Ledger,
    stack: LoadStack,
    cache: HashMap<String, Feature>,
    loaded: HashMap<Option<String>, HashSet<PathBuf>>,
}

impl Resolver {
    #[must_use]
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            stack: LoadStack::default(),
            cache: HashMap::new(),
            loaded: HashMap::new(),
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    #[must_use]
    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    #[must_use]
    pub fn load_stack(&self) -> &LoadStack {
        &self.stack
    }

    /// The library owning the feature on top of the load stack.
    #[must_use]
    pub fn current_library(&self) -> Option<&Arc<Library>> {
        self.stack.top().and_then(Feature::library)
    }

    /// Shorthand for [`Ledger::activate`].
    pub fn activate(&mut self, name: &str, constraint: Option<&str>) -> LedgerResult<Arc<Library>> {
        self.ledger.activate(name, constraint)
    }

    /// Feature previously resolved for `request`, if cached.
    #[must_use]
    pub fn cached(&self, request: &str) -> Option<&Feature> {
        self.cache.get(request)
    }

    /// Has `feature` been evaluated within `scope`?
    #[must_use]
    pub fn is_loaded(&self, feature: &Feature, scope: Option<&str>) -> bool {
        self.loaded
            .get(&scope.map(String::from))
            .is_some_and(|paths| paths.contains(feature.resolve()))
    }

    // ── Lookup ──────────────────────────────────────────────────

    /// Resolves `path` to a feature. The first of these that produces a
    /// hit wins:
    ///
    /// 1. absolute and relative paths (`/`, `~`, `.`) and paths with a `..`
    ///    component are refused
    /// 2. `from` restricts the lookup to that library, activating it
    /// 3. `local` looks in the library currently being loaded, ignoring
    ///    features already on the load stack
    /// 4. `head/rest` where `head` is a library name: `head/rest`, then
    ///    `rest`, inside that library
    /// 5. a bare library name resolves to the library's main feature
    /// 6. brute-force search of the whole ledger
    ///
    /// Only an explicit `from` library without a match is an error; every
    /// other miss is `Ok(None)`.
    pub fn find_feature(&mut self, path: &str, options: &FindOptions) -> LedgerResult<Option<Feature>> {
        if path.starts_with(['/', '~', '.']) || has_parent_component(path) {
            debug!(path = %path, "Refusing non-library path");
            return Ok(None);
        }

        if let Some(from) = options.from.as_deref() {
            let library = self.ledger.activate(from, None)?;
            let feature = library
                .find(path, options)
                .ok_or_else(|| LedgerError::FeatureNotFound {
                    path: path.to_string(),
                    library: Some(from.to_string()),
                })?;
            debug!(path = %path, library = %from, "Resolved in named library");
            return Ok(Some(feature));
        }

        if options.local {
            if let Some(feature) = self.find_local(path, options) {
                debug!(path = %path, "Resolved in current library");
                return Ok(Some(feature));
            }
        }

        match path.split_once('/') {
            Some((head, rest)) if !rest.is_empty() => {
                if let Some(library) = self.ledger.instance(head, None)? {
                    if let Some(feature) = library
                        .find(path, options)
                        .or_else(|| library.find(rest, options))
                    {
                        debug!(path = %path, library = %head, "Resolved by library prefix");
                        return Ok(Some(feature));
                    }
                }
            }
            Some(_) => {}
            None => {
                if let Some(library) = self.ledger.instance(path, None)? {
                    if let Some(feature) = library.default_feature() {
                        debug!(path = %path, "Resolved library main feature");
                        return Ok(Some(feature));
                    }
                }
            }
        }

        if let Some(feature) = self.ledger.brute_force_find(path, options, self.stack.top()) {
            debug!(path = %path, library = ?feature.library_name(), "Resolved by brute-force search");
            return Ok(Some(feature));
        }

        debug!(path = %path, "Not found in ledger");
        Ok(None)
    }

    fn find_local(&self, path: &str, options: &FindOptions) -> Option<Feature> {
        let library = self.current_library()?;
        library
            .find(path, options)
            .filter(|feature| !self.stack.contains(feature))
    }

    // ── Loading ─────────────────────────────────────────────────

    /// Resolves and evaluates `request` once per scope.
    ///
    /// Returns `Ok(false)` if the feature was already evaluated in the
    /// scope. Requests no library provides go to [`Evaluator::fallback`].
    pub fn require(
        &mut self,
        request: &str,
        options: &RequireOptions,
        evaluator: &mut dyn Evaluator,
    ) -> LedgerResult<bool> {
        let load = LoadOptions {
            scope: options.scope.clone(),
            require_once: true,
            force: options.force,
        };
        self.dispatch(request, &options.find, &load, evaluator)
    }

    /// Resolves and evaluates `request` even if evaluated before. The
    /// request must name the file exactly; no suffixes are tried and the
    /// current library is not consulted.
    pub fn load(
        &mut self,
        request: &str,
        options: &RequireOptions,
        evaluator: &mut dyn Evaluator,
    ) -> LedgerResult<bool> {
        let find = FindOptions {
            suffix_search: false,
            local: false,
            ..options.find.clone()
        };
        let load = LoadOptions {
            scope: options.scope.clone(),
            require_once: false,
            force: options.force,
        };
        self.dispatch(request, &find, &load, evaluator)
    }

    /// Like [`require`](Self::require), but looks in the current library
    /// first and accepts `library:path` to name the library explicitly.
    pub fn acquire(
        &mut self,
        request: &str,
        options: &RequireOptions,
        evaluator: &mut dyn Evaluator,
    ) -> LedgerResult<bool> {
        let mut find = FindOptions {
            local: true,
            ..options.find.clone()
        };
        let path = match request.split_once(':') {
            Some((library, path)) if !library.is_empty() && !path.is_empty() => {
                find.from = Some(library.to_string());
                path
            }
            _ => request,
        };
        let load = LoadOptions {
            scope: options.scope.clone(),
            require_once: true,
            force: options.force,
        };
        self.dispatch(path, &find, &load, evaluator)
    }

    // The cache is keyed by request text alone, so only lookups with the
    // default search rules use it. Local lookups also depend on the load
    // stack.
    fn dispatch(
        &mut self,
        request: &str,
        find: &FindOptions,
        load: &LoadOptions,
        evaluator: &mut dyn Evaluator,
    ) -> LedgerResult<bool> {
        let cacheable = *find == FindOptions::default();
        if cacheable {
            if let Some(feature) = self.cache.get(request).cloned() {
                debug!(path = %request, "Request cache hit");
                return feature.load(self, evaluator, load);
            }
        }

        match self.find_feature(request, find)? {
            Some(feature) => {
                if cacheable {
                    self.cache.insert(request.to_string(), feature.clone());
                }
                feature.load(self, evaluator, load)
            }
            None => evaluator.fallback(self, request, load),
        }
    }

    // ── Bookkeeping ─────────────────────────────────────────────

    /// Pushes `feature` onto the load stack until the frame is dropped.
    pub(crate) fn enter(&mut self, feature: Feature) -> LoadFrame<'_> {
        self.stack.0.push(feature);
        LoadFrame { resolver: self }
    }

    pub(crate) fn mark_loaded(&mut self, feature: &Feature, scope: Option<&str>) {
        self.loaded
            .entry(scope.map(String::from))
            .or_default()
            .insert(feature.resolve().to_path_buf());
    }

    pub(crate) fn unmark_loaded(&mut self, feature: &Feature, scope: Option<&str>) {
        if let Some(paths) = self.loaded.get_mut(&scope.map(String::from)) {
            paths.remove(feature.resolve());
        }
    }
}

/// Load stack guard: pops the pushed feature when dropped, so the stack is
/// restored on every exit path, including errors.
pub(crate) struct LoadFrame<'a> {
    resolver: &'a mut Resolver,
}

impl Deref for LoadFrame<'_> {
    type Target = Resolver;

    fn deref(&self) -> &Resolver {
        self.resolver
    }
}

impl DerefMut for LoadFrame<'_> {
    fn deref_mut(&mut self) -> &mut Resolver {
        self.resolver
    }
}

impl Drop for LoadFrame<'_> {
    fn drop(&mut self) {
        self.resolver.stack.0.pop();
    }
}
