//! Filesystem event handling for hot reload.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use super::core::LoadRegistry;
use super::error::Result;

/// Keeps a watcher alive; watching stops when this is dropped.
pub struct RegistryWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl RegistryWatcher {
    /// Directories being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl LoadRegistry {
    /// Watch every existing search-path directory and reload changed units
    /// when unit files are created, modified, renamed or removed.
    ///
    /// Reload failures are logged; the previous load stays recorded.
    pub fn watch(self: &Arc<Self>, environment: Option<String>) -> Result<RegistryWatcher> {
        let roots: Vec<PathBuf> = self
            .search()
            .directories(environment.as_deref())
            .into_iter()
            .filter(|dir| dir.is_dir())
            .collect();
        let registry = Arc::downgrade(self);
        let extension = self.extension().to_string();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    handle_fs_event(&event, &registry, &extension, environment.as_deref());
                }
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(directories = roots.len(), "watching search path for changes");
        Ok(RegistryWatcher {
            _watcher: watcher,
            roots,
        })
    }
}

/// Handle a single filesystem event from the notify watcher.
pub(super) fn handle_fs_event(
    event: &Event,
    registry: &Weak<LoadRegistry>,
    extension: &str,
    environment: Option<&str>,
) -> usize {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| is_unit_file(p, extension));
    if !relevant {
        return 0;
    }

    let Some(registry) = registry.upgrade() else {
        return 0;
    };

    match registry.reload_changed(environment) {
        Ok(reloaded) => {
            for name in &reloaded {
                info!(name = %name, "hot-reloaded unit");
            }
            reloaded.len()
        }
        Err(e) => {
            warn!(error = %e, "failed to reload during hot-reload, keeping previous version");
            0
        }
    }
}

fn is_unit_file(path: &Path, extension: &str) -> bool {
    // Skip dotfiles (editor swap files and the like).
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with('.') {
            return false;
        }
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == extension)
        .unwrap_or(false)
}
