//! Option structs for lookup and loading.

/// Controls how a path is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOptions {
    /// Try each known suffix after the bare name. Turned off automatically
    /// when the requested path already carries a known extension.
    pub suffix_search: bool,
    /// Skip legacy load paths (`<location>/<lp>/<name>/`).
    pub legacy_excluded: bool,
    /// Only consider a library's declared load paths.
    pub main_only: bool,
    /// Look in the library of the feature currently being loaded first.
    pub local: bool,
    /// Resolve only within this library.
    pub from: Option<String>,
    /// During brute-force search, consider only the newest candidate of
    /// each inactive library.
    pub latest_only: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            suffix_search: true,
            legacy_excluded: false,
            main_only: false,
            local: false,
            from: None,
            latest_only: false,
        }
    }
}

impl FindOptions {
    /// Lookup restricted to the named library.
    #[must_use]
    pub fn from_library(name: impl Into<String>) -> Self {
        Self {
            from: Some(name.into()),
            ..Self::default()
        }
    }

    /// Lookup that starts in the library currently being loaded.
    #[must_use]
    pub fn local() -> Self {
        Self {
            local: true,
            ..Self::default()
        }
    }

    /// Exact-name lookup.
    #[must_use]
    pub fn exact() -> Self {
        Self {
            suffix_search: false,
            ..Self::default()
        }
    }
}

/// Controls how a located feature is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Evaluation scope tag; `None` is the top-level scope.
    pub scope: Option<String>,
    /// Skip evaluation if the feature was already evaluated in this scope.
    pub require_once: bool,
    /// Evaluate without activating the owning library.
    pub force: bool,
}

impl LoadOptions {
    #[must_use]
    pub fn once() -> Self {
        Self {
            require_once: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn scoped(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            ..Self::default()
        }
    }
}

/// Options for the host-facing `require`/`load`/`acquire` entry points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequireOptions {
    pub find: FindOptions,
    pub scope: Option<String>,
    pub force: bool,
}
