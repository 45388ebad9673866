//! Configuration schema for morph
//!
//! Configuration is stored at `~/.config/morph/morph.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache locations and bundle server
    pub cache: CacheConfig,

    /// Git settings
    pub git: GitConfig,

    /// Overrides for the treeish resolver's mirror cache
    pub treeish: TreeishConfig,
}

impl Config {
    /// Cache root
    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Where repository mirrors live
    pub fn mirrors_dir(&self) -> PathBuf {
        self.cache_dir().join("gits")
    }

    /// Where build artifacts live
    pub fn artifacts_dir(&self) -> PathBuf {
        self.cache_dir().join("artifacts")
    }

    /// Mirror cache used for treeish resolution
    pub fn treeish_cache_dir(&self) -> PathBuf {
        self.treeish
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.mirrors_dir())
    }

    /// Bundle server used for treeish resolution
    pub fn treeish_bundle_server(&self) -> Option<String> {
        self.treeish
            .bundle_server
            .clone()
            .or_else(|| self.cache.bundle_server.clone())
    }
}

/// `<user cache dir>/morph`
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("morph")
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (default: `<user cache dir>/morph`)
    pub dir: Option<PathBuf>,

    /// Base URL of the bundle server; unset disables bundle seeding
    pub bundle_server: Option<String>,

    /// `morph artifacts gc` removes artifacts older than N days
    pub gc_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            bundle_server: None,
            gc_days: 30,
        }
    }
}

/// Git configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Resolve every treeish without submodules
    pub ignore_submodules: bool,

    /// `prefix=pull_pattern#push_pattern` repository aliases
    pub repo_aliases: Vec<String>,

    /// Deadline for fetch and clone steps in seconds (0 = none)
    pub timeout_secs: u64,
}

/// Treeish resolver overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeishConfig {
    /// Mirror cache (default: the repository cache's mirrors)
    pub cache_dir: Option<PathBuf>,

    /// Bundle server (default: `cache.bundle_server`)
    pub bundle_server: Option<String>,
}
