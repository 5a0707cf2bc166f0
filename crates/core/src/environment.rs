//! Environment and configuration providers consulted by the autoloader.
//!
//! Both providers report empty directory lists until the host marks itself
//! initialized, so nothing is resolved against half-built configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::config::Settings;

/// Supplies per-environment module directories.
pub trait EnvironmentProvider: Send + Sync {
    /// Whether host configuration has finished initializing.
    fn initialized(&self) -> bool;

    /// Ordered plugin/library directories for `environment`.
    ///
    /// Must return an empty list before [`initialized`](Self::initialized) is true.
    fn module_directories(&self, environment: Option<&str>) -> Vec<PathBuf>;
}

/// Supplies the configured library directories.
pub trait ConfigProvider: Send + Sync {
    /// Ordered library directories; empty before initialization.
    fn library_directories(&self) -> Vec<PathBuf>;
}

/// [`Settings`]-backed provider with an explicit initialization flag.
#[derive(Debug)]
pub struct HostEnvironment {
    settings: Settings,
    initialized: AtomicBool,
}

impl HostEnvironment {
    /// Create a provider that is not yet initialized.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            initialized: AtomicBool::new(false),
        }
    }

    /// Create a provider that reports initialized immediately.
    pub fn initialized_with(settings: Settings) -> Self {
        let env = Self::new(settings);
        env.mark_initialized();
        env
    }

    /// Flag host configuration as complete.
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl EnvironmentProvider for HostEnvironment {
    fn initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn module_directories(&self, environment: Option<&str>) -> Vec<PathBuf> {
        if !self.initialized() {
            return Vec::new();
        }
        self.settings
            .modulepath_for(environment)
            .iter()
            .flat_map(|dir| module_lib_dirs(dir))
            .collect()
    }
}

impl ConfigProvider for HostEnvironment {
    fn library_directories(&self) -> Vec<PathBuf> {
        if !self.initialized() {
            return Vec::new();
        }
        self.settings.libdir.clone()
    }
}

/// List `<dir>/<module>/lib` for every non-hidden module under `dir`.
fn module_lib_dirs(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "skipping unreadable module path entry");
            return Vec::new();
        }
    };

    let mut modules: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path().join("lib"))
        .filter(|lib| lib.is_dir())
        .collect();
    modules.sort();
    modules
}
