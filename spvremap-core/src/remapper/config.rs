//! Remapper configuration loaded from JSON.
//!
//! ```json
//! {
//!   "options": "STRIP | MAP_ALL | DCE_ALL",
//!   "verbosity": 2,
//!   "hash": { "fn_window": 2 }
//! }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remapper::options::{HashParams, RemapOptions, MAX_CANDIDATE_ID};

/// Failure to load a [`RemapConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("hash range of the {strategy} strategy runs past id {max}")]
    HashRange { strategy: &'static str, max: u32 },
}

/// Options, verbosity and hashing parameters of a remapping run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    pub options: RemapOptions,
    /// Log hook threshold; 0 is silent.
    pub verbosity: u32,
    pub hash: HashParams,
}

impl RemapConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RemapConfig = serde_json::from_str(text)?;
        if let Some(strategy) = config.hash.out_of_range() {
            return Err(ConfigError::HashRange {
                strategy,
                max: MAX_CANDIDATE_ID,
            });
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text: String = std::fs::read_to_string(path)?;
        let config: RemapConfig = Self::from_json(&text)?;
        log::debug!("loaded config from {}: {:?}", path.display(), config.options);
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = RemapConfig::from_json("{}").unwrap();
        assert_eq!(config, RemapConfig::default());
        assert_eq!(config.options, RemapOptions::ALL_BUT_STRIP);
    }

    #[test]
    fn test_options_text_form() {
        let config =
            RemapConfig::from_json(r#"{ "options": "STRIP | DCE_FUNCS", "verbosity": 3 }"#)
                .unwrap();
        assert_eq!(config.options, RemapOptions::STRIP | RemapOptions::DCE_FUNCS);
        assert_eq!(config.verbosity, 3);
    }

    #[test]
    fn test_json_round_trip() {
        let config = RemapConfig {
            options: RemapOptions::ALL,
            verbosity: 1,
            hash: HashParams::default(),
        };
        let back = RemapConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            RemapConfig::from_json("{ options"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_hash_range_is_checked() {
        let error = RemapConfig::from_json(r#"{ "hash": { "fn_offset": 4294967295 } }"#).unwrap_err();
        assert!(matches!(error, ConfigError::HashRange { strategy: "fn", .. }));
    }
}
