//! Name-keyed module autoloading.
//!
//! This crate provides:
//! - Logical name normalization
//! - Search path resolution over module, library and code directories
//! - A process-wide load registry with staleness checks and bulk reloads
//! - Prefix-scoped loaders bound to owners
//! - Hot reload of changed units via a `notify` watcher

pub mod execute;
pub mod loader;
pub mod path;
pub mod search;

pub use execute::{BoxError, CommandExecutor, ExecError, Executor};
pub use loader::{
    AutoloadError, LoadRecord, LoadRegistry, LoaderOptions, OwnerKey, RegistryBuilder,
    RegistryWatcher, Result, ScopeBinding, ScopedLoader,
};
pub use search::{DirectoryCache, SearchPath};
