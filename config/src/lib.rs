//! Mix Configuration
//!
//! Shared configuration crate for the shielded pool components.
//!
//! Handles loading configuration from:
//! 1. MIX_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.mix/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<MixConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".mix";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_DB_PATH: &str = "./mix-db";
const DEFAULT_MIN_TRANSFER_FEE: u64 = 0;
const DEFAULT_KEY_GRACE_VERSIONS: u64 = 0;
const DEFAULT_MAX_PROOFS: usize = 16;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.into(),
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.into()
}

/// Shielded pool policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Smallest fee a transfer may declare (0 disables the fee term)
    #[serde(default = "default_min_transfer_fee")]
    pub min_transfer_fee: u64,
    /// How many superseded verify-key versions a pinned proof may still use
    #[serde(default = "default_key_grace_versions")]
    pub key_grace_versions: u64,
    /// Accept only the N most recent roots as spend anchors (None = any)
    #[serde(default)]
    pub root_window: Option<u64>,
    /// Upper bound on proofs carried by one operation
    #[serde(default = "default_max_proofs")]
    pub max_proofs_per_operation: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_transfer_fee: DEFAULT_MIN_TRANSFER_FEE,
            key_grace_versions: DEFAULT_KEY_GRACE_VERSIONS,
            root_window: None,
            max_proofs_per_operation: DEFAULT_MAX_PROOFS,
        }
    }
}

fn default_min_transfer_fee() -> u64 {
    DEFAULT_MIN_TRANSFER_FEE
}
fn default_key_grace_versions() -> u64 {
    DEFAULT_KEY_GRACE_VERSIONS
}
fn default_max_proofs() -> usize {
    DEFAULT_MAX_PROOFS
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, field: &mut String) {
    if let Some(v) = lookup(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) {
    if let Some(v) = lookup(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

/// Set Option<T> from env var if present and parseable
fn env_parse_option<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut Option<T>,
) {
    if let Some(v) = lookup(key) {
        match v.parse() {
            Ok(parsed) => *field = Some(parsed),
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl MixConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check MIX_CONFIG env var
        if let Ok(path) = env::var("MIX_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("MIX_CONFIG points to missing file: {}", path.display());
        }

        // 2. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.mix/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Database
        env_string(&lookup, "MIX_DB_PATH", &mut self.database.path);

        // Pool policy
        env_parse(&lookup, "MIX_MIN_TRANSFER_FEE", &mut self.pool.min_transfer_fee);
        env_parse(&lookup, "MIX_KEY_GRACE_VERSIONS", &mut self.pool.key_grace_versions);
        env_parse_option(&lookup, "MIX_ROOT_WINDOW", &mut self.pool.root_window);
        env_parse(&lookup, "MIX_MAX_PROOFS", &mut self.pool.max_proofs_per_operation);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.pool.root_window = Some(100);
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static MixConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: MixConfig) -> Result<(), MixConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `MixConfig::global()`.
#[inline]
pub fn global_config() -> &'static MixConfig {
    MixConfig::global()
}
