//! Shadepool Configuration
//!
//! Shared configuration crate for the shadepool engine.
//!
//! Handles loading configuration from:
//! 1. SP_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.shadepool/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<ShadepoolConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".shadepool";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_CHAIN_KIND: u8 = 0;
const DEFAULT_CHAIN_ID: u64 = 1;
const DEFAULT_RELAY_ADAPT: &str = "0x0000000000000000000000000000000000000000";
const DEFAULT_MIN_GAS_PRICE: u64 = 0;
const DEFAULT_MEMO_MAX_BYTES: usize = 512;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShadepoolConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Ledger the engine builds transactions for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainConfig {
    /// Chain family (0 = EVM)
    #[serde(default = "default_chain_kind")]
    pub kind: u8,
    #[serde(default = "default_chain_id")]
    pub id: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            kind: DEFAULT_CHAIN_KIND,
            id: DEFAULT_CHAIN_ID,
        }
    }
}

fn default_chain_kind() -> u8 {
    DEFAULT_CHAIN_KIND
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

/// Deployed contract addresses (hex, 0x-prefixed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Relay adapt contract bound into relayed transactions
    #[serde(default = "default_relay_adapt")]
    pub relay_adapt: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            relay_adapt: DEFAULT_RELAY_ADAPT.into(),
        }
    }
}

fn default_relay_adapt() -> String {
    DEFAULT_RELAY_ADAPT.into()
}

/// Transaction builder defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Minimum gas price bound into every transaction of a batch.
    /// TOML integers are 64-bit, the builder widens this to the 72-bit
    /// ledger field.
    #[serde(default = "default_min_gas_price")]
    pub min_gas_price: u64,
    /// Reveal the sender's address to recipients of transfer outputs
    #[serde(default)]
    pub show_sender_address_to_recipient: bool,
    #[serde(default = "default_memo_max_bytes")]
    pub memo_max_bytes: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            min_gas_price: DEFAULT_MIN_GAS_PRICE,
            show_sender_address_to_recipient: false,
            memo_max_bytes: DEFAULT_MEMO_MAX_BYTES,
        }
    }
}

fn default_min_gas_price() -> u64 {
    DEFAULT_MIN_GAS_PRICE
}

fn default_memo_max_bytes() -> usize {
    DEFAULT_MEMO_MAX_BYTES
}

/// Chain history scanning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Pool-entry logs emitted strictly before this block use the legacy event shape
    #[serde(default)]
    pub legacy_shield_cutoff_block: Option<u64>,
}

impl ScanConfig {
    /// Whether a pool-entry log at `block_number` was emitted with the legacy shape
    pub fn is_legacy_shield_block(&self, block_number: u64) -> bool {
        self.legacy_shield_cutoff_block
            .is_some_and(|cutoff| block_number < cutoff)
    }
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable value for {}", key),
        }
    }
}

/// Set Option<T> from env var if present and parseable
fn env_parse_option<T: std::str::FromStr>(key: &str, field: &mut Option<T>) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = Some(parsed);
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl ShadepoolConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                let contents = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
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
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("SP_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        dirs::home_dir()
            .map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .filter(|p| p.exists())
    }

    fn apply_env_overrides(&mut self) {
        // Chain
        env_parse("SP_CHAIN_KIND", &mut self.chain.kind);
        env_parse("SP_CHAIN_ID", &mut self.chain.id);

        // Contracts
        env_string("SP_RELAY_ADAPT", &mut self.contracts.relay_adapt);

        // Builder
        env_parse("SP_MIN_GAS_PRICE", &mut self.builder.min_gas_price);
        if let Some(v) = env_bool("SP_SHOW_SENDER") {
            self.builder.show_sender_address_to_recipient = v;
        }
        env_parse("SP_MEMO_MAX_BYTES", &mut self.builder.memo_max_bytes);

        // Scan
        env_parse_option(
            "SP_LEGACY_SHIELD_CUTOFF",
            &mut self.scan.legacy_shield_cutoff_block,
        );
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> Result<String> {
        let mut sample = Self::default();
        sample.builder.min_gas_price = 1_000_000_000;
        sample.scan.legacy_shield_cutoff_block = Some(16_790_263);
        toml::to_string_pretty(&sample).context("Failed to serialize sample config")
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ShadepoolConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Try to get the global config instance.
    ///
    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static ShadepoolConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: ShadepoolConfig) -> Result<(), ShadepoolConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `ShadepoolConfig::global()`.
#[inline]
pub fn global_config() -> &'static ShadepoolConfig {
    ShadepoolConfig::global()
}

// ============================================================================
// Tests
// ============================================================================
