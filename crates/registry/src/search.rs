//! Search path composition and name resolution.
//!
//! The search path is rebuilt on every resolution from, in priority order:
//! per-environment module directories, configured library directories, and
//! the generic code path. Module directory listings are memoized per
//! environment in a [`DirectoryCache`] that the host clears explicitly.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use indexmap::IndexSet;
use tracing::debug;

use autoload_core::{ConfigProvider, EnvironmentProvider};

/// Per-environment memo of module directory listings.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    entries: RwLock<HashMap<Option<String>, Arc<Vec<PathBuf>>>>,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached listing for `environment`, computing it with `load` on a miss.
    pub fn get_or_insert_with(
        &self,
        environment: Option<&str>,
        load: impl FnOnce() -> Vec<PathBuf>,
    ) -> Arc<Vec<PathBuf>> {
        let key = environment.map(str::to_string);
        if let Some(dirs) = self
            .entries
            .read()
            .expect("directory cache lock poisoned")
            .get(&key)
        {
            return Arc::clone(dirs);
        }

        let dirs = Arc::new(load());
        debug!(environment = ?key, count = dirs.len(), "cached module directories");
        self.entries
            .write()
            .expect("directory cache lock poisoned")
            .entry(key)
            .or_insert(dirs)
            .clone()
    }

    /// Drop every cached listing.
    pub fn clear(&self) {
        self.entries
            .write()
            .expect("directory cache lock poisoned")
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("directory cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves logical names to files across the composed search path.
pub struct SearchPath {
    environments: Arc<dyn EnvironmentProvider>,
    config: Arc<dyn ConfigProvider>,
    code_path: Vec<PathBuf>,
    extension: String,
    cache: DirectoryCache,
}

impl SearchPath {
    pub fn new(
        environments: Arc<dyn EnvironmentProvider>,
        config: Arc<dyn ConfigProvider>,
        code_path: Vec<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            environments,
            config,
            code_path,
            extension: extension.into(),
            cache: DirectoryCache::new(),
        }
    }

    /// Source suffix of loadable units, without the dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }

    /// Module directories for `environment`; empty until the host is initialized.
    pub fn module_directories(&self, environment: Option<&str>) -> Vec<PathBuf> {
        if !self.environments.initialized() {
            return Vec::new();
        }
        // Listings are only memoized once configuration is trustworthy.
        self.cache
            .get_or_insert_with(environment, || {
                self.environments.module_directories(environment)
            })
            .as_ref()
            .clone()
    }

    /// Configured library directories; empty until the host is initialized.
    pub fn library_directories(&self) -> Vec<PathBuf> {
        if !self.environments.initialized() {
            return Vec::new();
        }
        self.config.library_directories()
    }

    /// Ordered candidate directories for `environment`.
    pub fn directories(&self, environment: Option<&str>) -> Vec<PathBuf> {
        let mut dirs = self.module_directories(environment);
        dirs.extend(self.library_directories());
        dirs.extend(self.code_path.iter().cloned());
        dirs
    }

    /// First `<dir>/<name>.<ext>` that exists as a regular file.
    ///
    /// `name` must be a cleaned, relative, extension-less logical name.
    pub fn resolve(&self, name: &str, environment: Option<&str>) -> Option<PathBuf> {
        let file = format!("{name}.{}", self.extension);
        let found = self
            .directories(environment)
            .into_iter()
            .map(|dir| dir.join(&file))
            .find(|candidate| candidate.is_file());
        if found.is_none() {
            debug!(name = %name, "name not found on search path");
        }
        found
    }

    /// Relative paths of `<dir>/<prefix>/*.<ext>` across the search path.
    ///
    /// Duplicates collapse onto their first occurrence; directory order is kept.
    pub fn files_under(&self, prefix: &str, environment: Option<&str>) -> Vec<String> {
        let mut files = IndexSet::new();
        for dir in self.directories(environment) {
            files.extend(files_in_dir(&dir, prefix, &self.extension));
        }
        files.into_iter().collect()
    }
}

/// `<prefix>/<file>.<ext>` entries of a single search directory, sorted.
fn files_in_dir(dir: &Path, prefix: &str, extension: &str) -> Vec<String> {
    let target = if prefix == "." || prefix.is_empty() {
        dir.to_path_buf()
    } else {
        dir.join(prefix)
    };
    let entries = match fs::read_dir(&target) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    let mut files: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == extension)
                .unwrap_or(false)
        })
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .map(|file| {
            if prefix == "." || prefix.is_empty() {
                file
            } else {
                format!("{prefix}/{file}")
            }
        })
        .collect();
    files.sort();
    files
}
