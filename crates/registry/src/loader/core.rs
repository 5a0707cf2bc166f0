//! Core [`LoadRegistry`]: name-keyed load bookkeeping with staleness checks.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use tracing::{debug, info};

use autoload_core::config::{validate_extension, DEFAULT_EXTENSION};
use autoload_core::{ConfigProvider, EnvironmentProvider, HostEnvironment, Settings};

use crate::execute::{ExecError, Executor};
use crate::path;
use crate::search::SearchPath;

use super::error::{AutoloadError, LoadRecord, Result};
use super::options::LoaderOptions;
use super::scoped::{OwnerKey, ScopeBinding};

/// Process-wide record of every unit loaded by name.
///
/// Names are resolved against a [`SearchPath`], executed through an
/// [`Executor`], and tracked by normalized logical name together with the
/// file and modification time seen at load. Share it as `Arc<LoadRegistry>`
/// and hand that to each [`ScopedLoader`](super::ScopedLoader).
pub struct LoadRegistry {
    search: SearchPath,
    executor: Arc<dyn Executor>,
    /// Load records keyed by normalized name (sorted for listings).
    records: RwLock<BTreeMap<String, LoadRecord>>,
    /// Scope bindings keyed by owner.
    pub(super) scopes: RwLock<HashMap<OwnerKey, ScopeBinding>>,
}

/// Builder for [`LoadRegistry`].
pub struct RegistryBuilder {
    executor: Arc<dyn Executor>,
    environments: Option<Arc<dyn EnvironmentProvider>>,
    config: Option<Arc<dyn ConfigProvider>>,
    code_path: Vec<PathBuf>,
    extension: String,
}

impl RegistryBuilder {
    /// Start a builder around the host's execution primitive.
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self {
            executor: Arc::new(executor),
            environments: None,
            config: None,
            code_path: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Provider of per-environment module directories.
    pub fn environments(mut self, provider: Arc<dyn EnvironmentProvider>) -> Self {
        self.environments = Some(provider);
        self
    }

    /// Provider of configured library directories.
    pub fn config(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.config = Some(provider);
        self
    }

    /// Generic code search path, consulted last.
    pub fn code_path(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.code_path = dirs.into_iter().collect();
        self
    }

    /// Source suffix of loadable units (default: `plugin`).
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Build the registry. Missing providers default to an initialized,
    /// empty [`HostEnvironment`].
    ///
    /// Fails if the extension is empty or is not a bare suffix.
    pub fn build(self) -> Result<LoadRegistry> {
        validate_extension(&self.extension)?;
        let fallback = || Arc::new(HostEnvironment::initialized_with(Settings::default()));
        let environments = self
            .environments
            .unwrap_or_else(|| fallback() as Arc<dyn EnvironmentProvider>);
        let config = self
            .config
            .unwrap_or_else(|| fallback() as Arc<dyn ConfigProvider>);

        Ok(LoadRegistry {
            search: SearchPath::new(environments, config, self.code_path, self.extension),
            executor: self.executor,
            records: RwLock::new(BTreeMap::new()),
            scopes: RwLock::new(HashMap::new()),
        })
    }
}

impl LoadRegistry {
    pub fn builder(executor: impl Executor + 'static) -> RegistryBuilder {
        RegistryBuilder::new(executor)
    }

    /// Wire a registry to a [`HostEnvironment`] and its settings.
    pub fn from_host(
        host: Arc<HostEnvironment>,
        executor: impl Executor + 'static,
    ) -> Result<Self> {
        let code_path = host.settings().code_path.clone();
        let extension = host.settings().extension.clone();
        RegistryBuilder::new(executor)
            .environments(host.clone())
            .config(host)
            .code_path(code_path)
            .extension(extension)
            .build()
    }

    pub fn search(&self) -> &SearchPath {
        &self.search
    }

    pub fn extension(&self) -> &str {
        self.search.extension()
    }

    /// Forget memoized module directory listings.
    pub fn clear_cache(&self) {
        self.search.cache().clear();
        debug!("cleared module directory cache");
    }

    // ── Resolution ──────────────────────────────────────────────

    /// File that `name` currently resolves to, if any.
    pub fn resolve(&self, name: &str, environment: Option<&str>) -> Result<Option<PathBuf>> {
        let key = self.relative_key(name)?;
        Ok(self.search.resolve(&key, environment))
    }

    /// Candidate unit files under `prefix` across the search path, without loading.
    pub fn files_under(&self, prefix: &str, environment: Option<&str>) -> Result<Vec<String>> {
        let prefix = relative_prefix(prefix)?;
        Ok(self.search.files_under(&prefix, environment))
    }

    // ── Loading ─────────────────────────────────────────────────

    /// Resolve and execute `name`. Returns `false` if nothing on the search
    /// path matches.
    ///
    /// Always re-executes, even when the unit is already loaded and unchanged.
    pub fn load(&self, name: &str, environment: Option<&str>) -> Result<bool> {
        self.load_with(name, environment, LoaderOptions::default())
    }

    pub(super) fn load_with(
        &self,
        name: &str,
        environment: Option<&str>,
        options: LoaderOptions,
    ) -> Result<bool> {
        let key = self.relative_key(name)?;
        let Some(file) = self.search.resolve(&key, environment) else {
            return Ok(false);
        };
        self.execute_file(key, file, options)?;
        Ok(true)
    }

    fn execute_file(&self, key: String, file: PathBuf, options: LoaderOptions) -> Result<()> {
        // Recorded before execution so a unit that loads its own name sees it.
        let record = new_record(key, file, options);
        let previous = self.insert_record(record.clone());
        self.run(record, previous)
    }

    /// Execute the unit behind an already-inserted `record`, rolling the
    /// table back to `previous` on failure.
    fn run(&self, record: LoadRecord, previous: Option<LoadRecord>) -> Result<()> {
        match self.executor.execute(&record.path, record.wrap) {
            Ok(()) => {
                info!(
                    name = %record.name,
                    path = %record.path.display(),
                    wrap = record.wrap,
                    "loaded unit"
                );
                Ok(())
            }
            Err(e) => {
                self.restore_record(&record, previous);
                match e {
                    ExecError::Fatal(cause) => Err(AutoloadError::Fatal(cause)),
                    ExecError::Failed(cause) => Err(AutoloadError::Load {
                        name: record.name,
                        source: cause,
                    }),
                }
            }
        }
    }

    /// Load every unit under `prefix` that is not loaded yet.
    ///
    /// Already-loaded names are skipped even when stale; use
    /// [`reload_changed`](Self::reload_changed) to refresh them.
    pub fn load_all(&self, prefix: &str, environment: Option<&str>) -> Result<Vec<String>> {
        self.load_all_with(prefix, environment, LoaderOptions::default())
    }

    pub(super) fn load_all_with(
        &self,
        prefix: &str,
        environment: Option<&str>,
        options: LoaderOptions,
    ) -> Result<Vec<String>> {
        let mut loaded = Vec::new();
        for file in self.files_under(prefix, environment)? {
            let key = path::registry_key(&file, self.extension());
            let Some(resolved) = self.search.resolve(&key, environment) else {
                continue;
            };
            // Claimed under the write lock so concurrent callers run each name once.
            let record = new_record(key, resolved, options);
            if !self.insert_if_absent(&record) {
                continue;
            }
            self.run(record.clone(), None)?;
            loaded.push(record.name);
        }
        Ok(loaded)
    }

    /// Reload every known unit whose [`changed`](Self::changed) check is true.
    ///
    /// Each reload reuses the wrap flag the unit was last loaded with.
    /// Records marked under an absolute name are not resolved; their own
    /// file is re-executed when its modification time moved.
    /// Stops at the first failing load.
    pub fn reload_changed(&self, environment: Option<&str>) -> Result<Vec<String>> {
        let known = self.records();

        let mut reloaded = Vec::new();
        for record in known {
            let options = LoaderOptions::default().wrap(record.wrap);
            if path::is_absolute(&record.name) {
                if !mtime_moved(&record) || !record.path.is_file() {
                    continue;
                }
                self.execute_file(record.name.clone(), record.path, options)?;
                reloaded.push(record.name);
                continue;
            }

            if !self.changed(&record.name, environment)? {
                continue;
            }
            if self.load_with(&record.name, environment, options)? {
                reloaded.push(record.name);
            }
        }
        Ok(reloaded)
    }

    // ── Bookkeeping ─────────────────────────────────────────────

    /// Whether a record exists for `name`.
    pub fn loaded(&self, name: &str) -> bool {
        let key = path::registry_key(name, self.extension());
        self.records
            .read()
            .expect("records lock poisoned")
            .contains_key(&key)
    }

    /// Record `file` as loaded for `name` without executing it.
    pub fn mark_loaded(&self, name: &str, file: impl AsRef<Path>) {
        let file = file.as_ref();
        self.insert_record(LoadRecord {
            name: path::registry_key(name, self.extension()),
            path: file.to_path_buf(),
            mtime: modified(file),
            wrap: LoaderOptions::default().wrap,
        });
    }

    /// Whether `name` should be reloaded.
    ///
    /// True when it was never loaded, when it now resolves to a different
    /// file, when the file's modification time moved, or when the file
    /// cannot be stat-ed.
    pub fn changed(&self, name: &str, environment: Option<&str>) -> Result<bool> {
        let key = self.relative_key(name)?;
        let Some(record) = self.record(&key) else {
            return Ok(true);
        };

        if self.search.resolve(&key, environment).as_deref() != Some(record.path.as_path()) {
            debug!(name = %key, "unit now resolves to a different file");
            return Ok(true);
        }

        Ok(mtime_moved(&record))
    }

    /// Record for `name`, if loaded.
    pub fn record(&self, name: &str) -> Option<LoadRecord> {
        let key = path::registry_key(name, self.extension());
        self.records
            .read()
            .expect("records lock poisoned")
            .get(&key)
            .cloned()
    }

    /// `(name, path)` for every loaded unit, sorted by name.
    pub fn list_loaded(&self) -> Vec<(String, PathBuf)> {
        self.records
            .read()
            .expect("records lock poisoned")
            .values()
            .map(|r| (r.name.clone(), r.path.clone()))
            .collect()
    }

    /// Every load record, sorted by name.
    pub fn records(&self) -> Vec<LoadRecord> {
        self.records
            .read()
            .expect("records lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn insert_record(&self, record: LoadRecord) -> Option<LoadRecord> {
        self.records
            .write()
            .expect("records lock poisoned")
            .insert(record.name.clone(), record)
    }

    fn insert_if_absent(&self, record: &LoadRecord) -> bool {
        let mut records = self.records.write().expect("records lock poisoned");
        if records.contains_key(&record.name) {
            return false;
        }
        records.insert(record.name.clone(), record.clone());
        true
    }

    /// Undo `inserted` unless another load replaced it meanwhile.
    fn restore_record(&self, inserted: &LoadRecord, previous: Option<LoadRecord>) {
        let mut records = self.records.write().expect("records lock poisoned");
        if records.get(&inserted.name) != Some(inserted) {
            return;
        }
        match previous {
            Some(prev) => {
                records.insert(prev.name.clone(), prev);
            }
            None => {
                records.remove(&inserted.name);
            }
        }
    }

    fn relative_key(&self, name: &str) -> Result<String> {
        if path::is_absolute(name) {
            return Err(AutoloadError::AbsoluteName(name.to_string()));
        }
        Ok(path::registry_key(name, self.extension()))
    }
}

/// Cleaned scope prefix; absolute prefixes are rejected.
pub(super) fn relative_prefix(prefix: &str) -> Result<String> {
    if path::is_absolute(prefix) {
        return Err(AutoloadError::AbsolutePrefix(prefix.to_string()));
    }
    Ok(path::clean(prefix))
}

fn new_record(name: String, path: PathBuf, options: LoaderOptions) -> LoadRecord {
    LoadRecord {
        name,
        mtime: modified(&path),
        path,
        wrap: options.wrap,
    }
}

/// Whether the recorded file's modification time differs from the one on
/// disk. Unknown on either side counts as moved.
fn mtime_moved(record: &LoadRecord) -> bool {
    match (record.mtime, modified(&record.path)) {
        (Some(then), Some(now)) => then != now,
        _ => true,
    }
}

fn modified(file: &Path) -> Option<SystemTime> {
    match fs::metadata(file).and_then(|m| m.modified()) {
        Ok(t) => Some(t),
        Err(e) => {
            debug!(path = %file.display(), error = %e, "could not read modification time");
            None
        }
    }
}
