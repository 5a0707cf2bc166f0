//! Error types and load records for the autoload registry.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::execute::BoxError;

/// Errors that can occur while resolving or loading units.
#[derive(Debug, thiserror::Error)]
pub enum AutoloadError {
    /// The executor failed while running a unit.
    #[error("could not autoload {name}: {source}")]
    Load {
        name: String,
        #[source]
        source: BoxError,
    },

    /// Process-termination-class failure from the executor, unwrapped.
    #[error(transparent)]
    Fatal(BoxError),

    /// Scope prefixes must be relative to the search path.
    #[error("autoload prefix must be relative: {0}")]
    AbsolutePrefix(String),

    /// Names must be relative where they are resolved against the search path.
    #[error("autoload name must be relative: {0}")]
    AbsoluteName(String),

    /// A scoped loader option outside the supported set.
    #[error("scoped loader does not accept option {0}")]
    UnknownOption(String),

    /// Loader options that could not be decoded.
    #[error("invalid loader options: {0}")]
    InvalidOptions(String),

    /// Registry settings that failed validation.
    #[error(transparent)]
    Config(#[from] autoload_core::CoreError),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, AutoloadError>;

/// What was loaded for one logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadRecord {
    /// Normalized, extension-less logical name.
    pub name: String,
    /// File that was executed for `name`.
    pub path: PathBuf,
    /// Modification time observed at load; `None` if it could not be read.
    #[serde(serialize_with = "serialize_mtime")]
    pub mtime: Option<SystemTime>,
    /// Whether the unit was executed wrapped.
    pub wrap: bool,
}

fn serialize_mtime<S: serde::Serializer>(
    mtime: &Option<SystemTime>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match mtime {
        Some(t) => serializer.serialize_some(&DateTime::<Utc>::from(*t).to_rfc3339()),
        None => serializer.serialize_none(),
    }
}
