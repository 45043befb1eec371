//! Engine configuration.
//!
//! Configuration lives in an optional YAML file at the project root. Every
//! section is optional; a missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AnalysisError, Result};

/// Config file names searched for in the project root, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["treesight.yaml", ".treesight.yaml", "treesight.yml"];

/// Default upper bound on cached analysis results.
pub const DEFAULT_CACHE_ENTRIES: usize = 512;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    /// Extra file extension → language mappings (extension without dot).
    #[serde(default)]
    pub extensions: HashMap<String, String>,
    /// Additional or overriding named queries: language → name → query source.
    #[serde(default)]
    pub queries: BTreeMap<String, BTreeMap<String, String>>,
    /// Per-language override of the plugin's default query list.
    #[serde(default)]
    pub default_queries: HashMap<String, Vec<String>>,
}

/// Cache section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_CACHE_ENTRIES,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_entries() -> usize {
    DEFAULT_CACHE_ENTRIES
}

impl EngineConfig {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| AnalysisError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse_str(&content).map_err(|message| AnalysisError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse a configuration from YAML text.
    pub fn parse_str(content: &str) -> std::result::Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        config.normalize();
        Ok(config)
    }

    /// Extension keys are stored lowercase and without a leading dot.
    fn normalize(&mut self) {
        self.extensions = self
            .extensions
            .drain()
            .map(|(ext, language)| (normalize_extension(&ext), language))
            .collect();
    }

    /// Find the config file in `root`, if any.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file())
    }

    /// Load the config for a project root, falling back to defaults when no file exists.
    pub fn load_for_root(root: &Path) -> Result<Self> {
        match Self::discover(root) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading engine configuration");
                Self::parse_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Look up a configured extension mapping. Leading dots and case are ignored.
    pub fn language_for_extension(&self, ext: &str) -> Option<&str> {
        self.extensions
            .get(&normalize_extension(ext))
            .map(|s| s.as_str())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}
