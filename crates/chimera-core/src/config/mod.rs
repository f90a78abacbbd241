pub mod batch_config;
pub mod pool_config;

mod duration_ms;

use serde::{Deserialize, Serialize};

pub use batch_config::BatchWriterConfig;
pub use pool_config::PoolConfig;

/// Top-level configuration for the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub pool: PoolConfig,
    pub batch: BatchWriterConfig,
}

impl StoreConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
