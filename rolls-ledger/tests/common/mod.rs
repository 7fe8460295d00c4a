//! Shared fixtures for ledger tests: on-disk project trees and a recording
//! evaluator.

#![allow(dead_code)]

use rolls_ledger::{
    Evaluator, Feature, Ledger, LedgerError, LedgerResult, LibraryMetadata, RequireOptions,
    Resolver, StaticMetadata,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding library directories, plus the metadata
/// describing them.
pub struct Project {
    dir: TempDir,
    provider: StaticMetadata,
    locations: Vec<PathBuf>,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            provider: StaticMetadata::new(),
            locations: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `relative` inside the project.
    pub fn path(&self, relative: &str) -> PathBuf {
        std::path::absolute(self.dir.path().join(relative)).unwrap()
    }

    /// Creates library `name` at `<root>/<dir>` with the given files,
    /// relative to the library directory.
    pub fn library(&mut self, dir: &str, name: &str, version: &str, files: &[&str]) -> PathBuf {
        let metadata = LibraryMetadata::parse(name, version).unwrap();
        self.library_with(dir, metadata, files)
    }

    pub fn library_with(&mut self, dir: &str, metadata: LibraryMetadata, files: &[&str]) -> PathBuf {
        let location = self.dir.path().join(dir);
        fs::create_dir_all(&location).unwrap();
        for file in files {
            self.write(&location.join(file));
        }
        self.provider.insert(location.clone(), metadata);
        self.locations.push(location.clone());
        location
    }

    /// Creates a directory with files but no metadata.
    pub fn plain_dir(&self, dir: &str, files: &[&str]) -> PathBuf {
        let location = self.dir.path().join(dir);
        fs::create_dir_all(&location).unwrap();
        for file in files {
            self.write(&location.join(file));
        }
        location
    }

    fn write(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, format!("# {}\n", path.display())).unwrap();
    }

    pub fn provider(&self) -> StaticMetadata {
        self.provider.clone()
    }

    /// A ledger primed with every library created so far.
    pub fn ledger(&self) -> Ledger {
        let mut ledger = Ledger::new(self.provider());
        ledger.prime(&self.locations);
        ledger
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.ledger())
    }
}

/// Records every evaluation. Can be told to issue nested requests or fail
/// for particular files.
#[derive(Default)]
pub struct Recorder {
    /// (path, scope) in evaluation order.
    pub evaluated: Vec<(PathBuf, Option<String>)>,
    /// Load stack depth seen by each evaluation.
    pub depths: Vec<usize>,
    /// Current library name seen by each evaluation.
    pub current: Vec<Option<String>>,
    /// Requests to `acquire` while evaluating the keyed file.
    pub nested: HashMap<PathBuf, Vec<String>>,
    /// Files whose evaluation fails.
    pub failing: HashSet<PathBuf>,
    /// Requests that reached the fallback hook.
    pub fallbacks: Vec<String>,
    /// When set, the fallback succeeds instead of reporting not-found.
    pub accept_fallback: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluated_paths(&self) -> Vec<PathBuf> {
        self.evaluated.iter().map(|(path, _)| path.clone()).collect()
    }
}

impl Evaluator for Recorder {
    fn evaluate(
        &mut self,
        resolver: &mut Resolver,
        feature: &Feature,
        content: &[u8],
        scope: Option<&str>,
    ) -> LedgerResult<()> {
        assert!(!content.is_empty());
        let path = feature.resolve().to_path_buf();
        self.evaluated.push((path.clone(), scope.map(String::from)));
        self.depths.push(resolver.load_stack().len());
        self.current
            .push(resolver.current_library().map(|lib| lib.name().to_string()));

        if self.failing.contains(&path) {
            return Err(LedgerError::Evaluation {
                path,
                message: "boom".into(),
            });
        }
        for request in self.nested.get(&path).cloned().unwrap_or_default() {
            resolver.acquire(&request, &RequireOptions::default(), self)?;
        }
        Ok(())
    }

    fn fallback(
        &mut self,
        _resolver: &mut Resolver,
        request: &str,
        _options: &rolls_ledger::LoadOptions,
    ) -> LedgerResult<bool> {
        self.fallbacks.push(request.to_string());
        if self.accept_fallback {
            Ok(true)
        } else {
            Err(LedgerError::FeatureNotFound {
                path: request.to_string(),
                library: None,
            })
        }
    }
}
