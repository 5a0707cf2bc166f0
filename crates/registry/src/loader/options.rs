//! Options accepted by scoped loaders.

use serde::{Deserialize, Serialize};

use super::error::{AutoloadError, Result};

fn default_wrap() -> bool {
    true
}

/// Closed option set for a scoped loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderOptions {
    /// Ask the executor to sandbox each unit.
    #[serde(default = "default_wrap")]
    pub wrap: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            wrap: default_wrap(),
        }
    }
}

impl LoaderOptions {
    pub fn wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    /// Decode options from a JSON object, rejecting keys outside the set.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if let Some(map) = value.as_object() {
            if let Some(unknown) = map.keys().find(|k| k.as_str() != "wrap") {
                return Err(AutoloadError::UnknownOption(unknown.clone()));
            }
        }
        serde_json::from_value(value).map_err(|e| AutoloadError::InvalidOptions(e.to_string()))
    }
}
