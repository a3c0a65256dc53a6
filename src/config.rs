//! Build configuration.
//!
//! Values come from serde defaults, then an optional YAML/TOML/JSON file,
//! then `SPHINX_KCONFIG_*` environment variables.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Prefix of environment overrides (`SPHINX_KCONFIG_KCONFIG_GENERATE_DB=true`)
pub const ENV_PREFIX: &str = "SPHINX_KCONFIG";

/// A project whose inventory can satisfy references not found locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersphinxTarget {
    /// Base URI the inventory's locations are relative to
    pub uri: String,
    /// Local copy of the project's `objects.inv`
    pub inventory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub project: String,
    pub version: Option<String>,
    /// Build the options database (required by the search directive)
    pub kconfig_generate_db: bool,
    /// Root Kconfig file, relative to the source directory
    pub kconfig_root_path: PathBuf,
    pub html_static_path: Vec<PathBuf>,
    pub html_extra_path: Vec<PathBuf>,
    pub intersphinx_mapping: IndexMap<String, IntersphinxTarget>,
    pub parallel_jobs: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project: "Project".to_string(),
            version: None,
            kconfig_generate_db: false,
            kconfig_root_path: PathBuf::from("../Kconfig"),
            html_static_path: Vec::new(),
            html_extra_path: Vec::new(),
            intersphinx_mapping: IndexMap::new(),
            parallel_jobs: None,
        }
    }
}

impl BuildConfig {
    /// Loads the configuration from `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, BuildError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Resolves a configured path against the source directory.
    pub fn resolve_path(&self, source_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            source_dir.join(path)
        }
    }

    pub fn kconfig_root(&self, source_dir: &Path) -> PathBuf {
        self.resolve_path(source_dir, &self.kconfig_root_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert!(!config.kconfig_generate_db);
        assert_eq!(config.kconfig_root_path, PathBuf::from("../Kconfig"));
        assert!(config.html_extra_path.is_empty());
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf.yaml");
        fs::write(
            &path,
            "project: Demo\nkconfig_generate_db: true\nkconfig_root_path: Kconfig\nintersphinx_mapping:\n  zephyr:\n    uri: https://docs.example.org/\n    inventory: zephyr.inv\n",
        )
        .unwrap();

        let config = BuildConfig::load(Some(&path)).unwrap();
        assert_eq!(config.project, "Demo");
        assert!(config.kconfig_generate_db);
        assert_eq!(config.kconfig_root(dir.path()), dir.path().join("Kconfig"));
        assert_eq!(config.intersphinx_mapping["zephyr"].uri, "https://docs.example.org/");
        // untouched keys keep their defaults
        assert!(config.parallel_jobs.is_none());
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let config = BuildConfig::default();
        let abs = std::env::temp_dir().join("Kconfig");
        assert_eq!(config.resolve_path(Path::new("docs"), &abs), abs);
    }
}
