use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::default_store_path;

/// Loaded from `--config`'s TOML file, then overridden field-by-field by
/// whichever CLI flags or environment variables the user actually passed —
/// the same file-then-flags-then-env layering the teacher's `Config`
/// applies via `clap_serde_derive::ClapSerde`, simplified here to the one
/// setting this CLI actually needs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_path: default_store_path(),
        }
    }
}

impl Config {
    /// Reads `path` if it exists, otherwise falls back to defaults; either
    /// way `store_path_override` (CLI flag or `GOVERNANCE_STORE` env var)
    /// wins if given.
    pub fn load(path: Option<&std::path::Path>, store_path_override: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)?
            },
            _ => Config::default(),
        };
        if let Some(store_path) = store_path_override {
            config.store_path = store_path;
        }
        Ok(config)
    }
}
