//! Global load registry and scoped loaders.
//!
//! The registry resolves logical names on the search path, executes the
//! resolved files through the host's executor, and remembers the file and
//! modification time of every load so changed units can be reloaded.
//! A `notify` watcher can drive those reloads automatically.

mod core;
mod error;
mod options;
mod scoped;
mod watcher;


pub use self::core::{LoadRegistry, RegistryBuilder};
pub use self::error::{AutoloadError, LoadRecord, Result};
pub use self::options::LoaderOptions;
pub use self::scoped::{OwnerKey, ScopeBinding, ScopedLoader};
pub use self::watcher::RegistryWatcher;
