//! Scoped loaders: prefix-qualified views over the shared [`LoadRegistry`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::path;

use super::core::{relative_prefix, LoadRegistry};
use super::error::{AutoloadError, Result};
use super::options::LoaderOptions;

/// Opaque identity of a scope owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OwnerKey(String);

impl OwnerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for OwnerKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registered association of an owner with a prefix and options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeBinding {
    pub owner: OwnerKey,
    pub prefix: String,
    pub options: LoaderOptions,
}

/// Forwards every operation to the registry with names qualified by `prefix`.
///
/// `loader.load("file", env)` is exactly `registry.load("<prefix>/file", env)`,
/// executed with this loader's options.
#[derive(Clone)]
pub struct ScopedLoader {
    registry: Arc<LoadRegistry>,
    prefix: String,
    options: LoaderOptions,
}

impl fmt::Debug for ScopedLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedLoader")
            .field("prefix", &self.prefix)
            .field("options", &self.options)
            .finish()
    }
}

impl ScopedLoader {
    /// Build an unregistered loader. Fails on an absolute prefix before any I/O.
    pub fn new(registry: Arc<LoadRegistry>, prefix: &str, options: LoaderOptions) -> Result<Self> {
        Ok(Self {
            registry,
            prefix: relative_prefix(prefix)?,
            options,
        })
    }

    /// Like [`new`](Self::new), taking options as a JSON object.
    pub fn with_json_options(
        registry: Arc<LoadRegistry>,
        prefix: &str,
        options: serde_json::Value,
    ) -> Result<Self> {
        let prefix = relative_prefix(prefix)?;
        let options = LoaderOptions::from_json(options)?;
        Ok(Self {
            registry,
            prefix,
            options,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    pub fn registry(&self) -> &Arc<LoadRegistry> {
        &self.registry
    }

    /// Logical name of `name` inside this scope.
    pub fn expand(&self, name: &str) -> Result<String> {
        if path::is_absolute(name) {
            return Err(AutoloadError::AbsoluteName(name.to_string()));
        }
        Ok(path::join(&self.prefix, name))
    }

    pub fn load(&self, name: &str, environment: Option<&str>) -> Result<bool> {
        let name = self.expand(name)?;
        self.registry.load_with(&name, environment, self.options)
    }

    pub fn load_all(&self, environment: Option<&str>) -> Result<Vec<String>> {
        self.registry
            .load_all_with(&self.prefix, environment, self.options)
    }

    pub fn loaded(&self, name: &str) -> Result<bool> {
        Ok(self.registry.loaded(&self.expand(name)?))
    }

    pub fn changed(&self, name: &str, environment: Option<&str>) -> Result<bool> {
        self.registry.changed(&self.expand(name)?, environment)
    }

    pub fn files_under(&self, environment: Option<&str>) -> Result<Vec<String>> {
        self.registry.files_under(&self.prefix, environment)
    }

    pub fn resolve(&self, name: &str, environment: Option<&str>) -> Result<Option<PathBuf>> {
        self.registry.resolve(&self.expand(name)?, environment)
    }
}

impl LoadRegistry {
    /// Bind `owner` to `prefix`, replacing any earlier binding for that owner.
    pub fn register_scope(
        self: &Arc<Self>,
        owner: impl Into<OwnerKey>,
        prefix: &str,
        options: LoaderOptions,
    ) -> Result<ScopedLoader> {
        let loader = ScopedLoader::new(Arc::clone(self), prefix, options)?;
        let owner = owner.into();
        debug!(owner = %owner, prefix = %loader.prefix, "registered autoload scope");
        self.scopes.write().expect("scopes lock poisoned").insert(
            owner.clone(),
            ScopeBinding {
                owner,
                prefix: loader.prefix.clone(),
                options,
            },
        );
        Ok(loader)
    }

    /// Loader for an existing binding.
    pub fn scope(self: &Arc<Self>, owner: &OwnerKey) -> Option<ScopedLoader> {
        let scopes = self.scopes.read().expect("scopes lock poisoned");
        scopes.get(owner).map(|binding| ScopedLoader {
            registry: Arc::clone(self),
            prefix: binding.prefix.clone(),
            options: binding.options,
        })
    }

    /// Every registered binding, sorted by owner.
    pub fn scopes(&self) -> Vec<ScopeBinding> {
        let mut bindings: Vec<ScopeBinding> = self
            .scopes
            .read()
            .expect("scopes lock poisoned")
            .values()
            .cloned()
            .collect();
        bindings.sort_by(|a, b| a.owner.cmp(&b.owner));
        bindings
    }
}
