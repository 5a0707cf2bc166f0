use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Source suffix used when the configuration does not name one.
pub const DEFAULT_EXTENSION: &str = "plugin";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Split a platform path list (`a:b:c` on Unix, `a;b;c` on Windows).
fn path_list(value: &str) -> Vec<PathBuf> {
    env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

/// Check that `extension` is a non-empty bare file suffix (no dot, no separator).
pub fn validate_extension(extension: &str) -> Result<()> {
    if extension.is_empty() {
        return Err(CoreError::Config("extension must not be empty".into()));
    }
    if extension.contains(['.', '/', '\\']) {
        return Err(CoreError::Config(format!(
            "extension '{extension}' must be a bare suffix"
        )));
    }
    Ok(())
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

// ── Top-level settings ────────────────────────────────────────

/// Host settings consumed by the autoloader.
///
/// Describes where loadable units live: per-environment module paths, the
/// configured library directories, and the generic code search path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Environment used when a caller does not name one.
    #[serde(default)]
    pub environment: Option<String>,

    /// Module path used for environments without an explicit entry.
    #[serde(default)]
    pub modulepath: Vec<PathBuf>,

    /// Per-environment module paths.
    #[serde(default)]
    pub environments: HashMap<String, Vec<PathBuf>>,

    /// Configured library directories, searched after module directories.
    #[serde(default)]
    pub libdir: Vec<PathBuf>,

    /// Generic code search path, searched last.
    #[serde(default)]
    pub code_path: Vec<PathBuf>,

    /// Source suffix of loadable units, without the leading dot.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: None,
            modulepath: Vec::new(),
            environments: HashMap::new(),
            libdir: Vec::new(),
            code_path: Vec::new(),
            extension: default_extension(),
        }
    }
}

impl Settings {
    /// Build settings from environment variables (call `load_dotenv()` first).
    ///
    /// Path lists use the platform path separator.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_overrides(env_opt);
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a TOML string, then apply environment overrides.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Self::from_toml_with(toml_str, env_opt)
    }

    /// Load settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with(path, env_opt)
    }

    fn from_toml_with(toml_str: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings: Self = toml::from_str(toml_str)?;
        settings.apply_overrides(lookup);
        settings.validate()?;
        Ok(settings)
    }

    fn from_file_with(
        path: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_with(&content, lookup)
    }

    /// Module path configured for `environment`, falling back to `modulepath`.
    pub fn modulepath_for(&self, environment: Option<&str>) -> &[PathBuf] {
        environment
            .or(self.environment.as_deref())
            .and_then(|name| self.environments.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&self.modulepath)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("AUTOLOAD_ENVIRONMENT") {
            self.environment = Some(v);
        }
        if let Some(v) = lookup("AUTOLOAD_MODULEPATH") {
            self.modulepath = path_list(&v);
        }
        if let Some(v) = lookup("AUTOLOAD_LIBDIR") {
            self.libdir = path_list(&v);
        }
        if let Some(v) = lookup("AUTOLOAD_CODE_PATH") {
            self.code_path = path_list(&v);
        }
        if let Some(v) = lookup("AUTOLOAD_EXTENSION") {
            self.extension = v.trim_start_matches('.').to_string();
        }
    }

    // ── Validation ──────────────────────────────────────────────

    /// Reject extensions that could not appear as a single file suffix.
    pub fn validate(&self) -> Result<()> {
        validate_extension(&self.extension)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            environment = self.environment.as_deref().unwrap_or("(none)"),
            modulepath = self.modulepath.len(),
            environments = self.environments.len(),
            libdir = self.libdir.len(),
            code_path = self.code_path.len(),
            extension = %self.extension,
            "autoload settings loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_toml() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.extension, "plugin");
        assert!(settings.modulepath.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
environment = "production"
modulepath = ["/etc/site/modules"]
libdir = ["/var/lib/site/lib", "/opt/site/lib"]
code_path = ["/usr/lib/site"]
extension = "rhai"

[environments]
production = ["/srv/prod/modules", "/srv/shared/modules"]
"#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.environment.as_deref(), Some("production"));
        assert_eq!(settings.libdir.len(), 2);
        assert_eq!(settings.extension, "rhai");
        assert_eq!(
            settings.modulepath_for(None),
            &[
                PathBuf::from("/srv/prod/modules"),
                PathBuf::from("/srv/shared/modules")
            ]
        );
    }

    #[test]
    fn modulepath_falls_back_for_unknown_environment() {
        let mut settings = Settings::default();
        settings.modulepath = vec![PathBuf::from("/modules")];
        settings
            .environments
            .insert("dev".into(), vec![PathBuf::from("/dev/modules")]);

        assert_eq!(settings.modulepath_for(Some("dev")), &[PathBuf::from("/dev/modules")]);
        assert_eq!(settings.modulepath_for(Some("qa")), &[PathBuf::from("/modules")]);
        assert_eq!(settings.modulepath_for(None), &[PathBuf::from("/modules")]);
    }

    #[test]
    fn overrides_replace_lists_and_strip_dot() {
        let mut settings = Settings::default();
        let joined = env::join_paths(["/a/lib", "/b/lib"]).unwrap();
        let joined = joined.to_string_lossy().into_owned();

        settings.apply_overrides(|key| match key {
            "AUTOLOAD_LIBDIR" => Some(joined.clone()),
            "AUTOLOAD_EXTENSION" => Some(".lua".into()),
            _ => None,
        });

        assert_eq!(settings.libdir, vec![PathBuf::from("/a/lib"), PathBuf::from("/b/lib")]);
        assert_eq!(settings.extension, "lua");
        assert!(settings.code_path.is_empty());
    }

    #[test]
    fn validate_rejects_bad_extension() {
        let mut settings = Settings::default();
        settings.extension = String::new();
        assert!(matches!(settings.validate(), Err(CoreError::Config(_))));

        settings.extension = "tar.gz".into();
        assert!(matches!(settings.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("autoload.toml");
        std::fs::write(&path, "libdir = [\"/x\"]\n").unwrap();

        let settings = Settings::from_file_with(&path, |_| None).unwrap();
        assert_eq!(settings.libdir, vec![PathBuf::from("/x")]);
        assert_eq!(settings.extension, "plugin");
    }

    #[test]
    fn from_file_applies_injected_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("autoload.toml");
        std::fs::write(&path, "extension = \"rb\"\nlibdir = [\"/x\"]\n").unwrap();

        let settings = Settings::from_file_with(&path, |key| match key {
            "AUTOLOAD_EXTENSION" => Some(".lua".into()),
            "AUTOLOAD_ENVIRONMENT" => Some("staging".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(settings.extension, "lua");
        assert_eq!(settings.environment.as_deref(), Some("staging"));
        assert_eq!(settings.libdir, vec![PathBuf::from("/x")]);
    }

    #[test]
    fn from_toml_rejects_bad_override() {
        let err = Settings::from_toml_with("", |key| {
            (key == "AUTOLOAD_EXTENSION").then(|| "tar.gz".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let err = Settings::from_file_with("/nonexistent/autoload.toml", |_| None).unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
