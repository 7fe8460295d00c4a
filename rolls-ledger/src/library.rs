//! A library discovered at one location.

use crate::error::{LedgerError, LedgerResult};
use crate::feature::Feature;
use crate::metadata::LibraryMetadata;
use crate::options::FindOptions;
use rolls_version::Version;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Known feature suffixes in priority order: source first, then compiled.
pub const SUFFIXES: &[&str] = &[".rb", ".rbw", ".so", ".bundle", ".dll", ".sl", ".jar"];

/// Does `path` already end in one of the [`SUFFIXES`]?
#[must_use]
pub fn has_known_suffix(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUFFIXES.iter().any(|s| s[1..] == *ext))
}

/// Does `path` step up a directory anywhere?
#[must_use]
pub fn has_parent_component(path: &str) -> bool {
    path.split(['/', '\\']).any(|part| part == "..")
}

/// One version of a library at one absolute location.
///
/// Libraries are shared as `Arc<Library>` between the ledger and the
/// features found inside them. Whether a library is active is recorded by
/// the [`Ledger`](crate::Ledger), not here.
pub struct Library {
    location: PathBuf,
    metadata: LibraryMetadata,
    legacy_load_paths: OnceLock<Vec<String>>,
}

impl Library {
    /// Creates a library rooted at `location`, which must be a directory.
    pub fn new(location: impl AsRef<Path>, metadata: LibraryMetadata) -> LedgerResult<Self> {
        let location = location.as_ref();
        if !location.is_dir() {
            return Err(LedgerError::NotADirectory(location.to_path_buf()));
        }
        Ok(Self {
            location: std::path::absolute(location)?,
            metadata,
            legacy_load_paths: OnceLock::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        self.metadata.version()
    }

    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    #[must_use]
    pub fn metadata(&self) -> &LibraryMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn load_paths(&self) -> &[String] {
        self.metadata.load_paths()
    }

    /// Declared load paths joined onto the location.
    #[must_use]
    pub fn absolute_load_paths(&self) -> Vec<PathBuf> {
        self.load_paths()
            .iter()
            .map(|lp| self.location.join(lp))
            .collect()
    }

    /// Load paths of the form `<lp>/<name>` that exist as directories.
    /// Computed on first use.
    pub fn legacy_load_paths(&self) -> &[String] {
        self.legacy_load_paths.get_or_init(|| {
            self.load_paths()
                .iter()
                .map(|lp| format!("{lp}/{}", self.name()))
                .filter(|llp| self.location.join(llp).is_dir())
                .collect()
        })
    }

    /// True when the library nests its files under `<lp>/<name>/`.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        !self.legacy_load_paths().is_empty()
    }

    /// Looks for `path` inside this library.
    ///
    /// Declared load paths are searched before legacy ones; within each load
    /// path every suffix is tried in order. Returns `None` when nothing
    /// matches or when `path` would leave the load path through `..`.
    pub fn find(self: &Arc<Self>, path: &str, options: &FindOptions) -> Option<Feature> {
        if has_parent_component(path) {
            return None;
        }
        let suffix_search = options.suffix_search && !has_known_suffix(path);
        let legacy: &[String] = if options.main_only || options.legacy_excluded {
            &[]
        } else {
            self.legacy_load_paths()
        };

        for load_path in self.load_paths().iter().chain(legacy) {
            let base = self.location.join(load_path);
            if suffix_search {
                for &suffix in SUFFIXES {
                    if base.join(format!("{path}{suffix}")).is_file() {
                        return Some(Feature::new(Arc::clone(self), load_path, path, Some(suffix)));
                    }
                }
            } else if base.join(path).is_file() {
                return Some(Feature::new(Arc::clone(self), load_path, path, None));
            }
        }
        None
    }

    /// The library's main feature: a file named after the library in one of
    /// its declared load paths.
    pub fn default_feature(self: &Arc<Self>) -> Option<Feature> {
        let options = FindOptions {
            main_only: true,
            ..FindOptions::default()
        };
        self.find(self.name(), &options)
    }

    /// Executables directory, `<location>/bin`.
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.location.join("bin")
    }

    #[must_use]
    pub fn has_bin_dir(&self) -> bool {
        self.bin_dir().exists()
    }

    /// System configuration directory, `<location>/etc`.
    #[must_use]
    pub fn conf_dir(&self) -> PathBuf {
        self.location.join("etc")
    }

    #[must_use]
    pub fn has_conf_dir(&self) -> bool {
        self.conf_dir().exists()
    }

    /// Shared data directory, `<location>/data`.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.location.join("data")
    }

    #[must_use]
    pub fn has_data_dir(&self) -> bool {
        self.data_dir().exists()
    }
}

impl PartialEq for Library {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.version() == other.version()
            && self.location == other.location
    }
}

impl Eq for Library {}

impl Hash for Library {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
        self.version().hash(state);
        self.location.hash(state);
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} @ {}",
            self.name(),
            self.version(),
            self.location.display()
        )
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name())
            .field("version", &self.version().to_string())
            .field("location", &self.location)
            .finish()
    }
}
