//! Engine configuration: RON file plus environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::context::DEFAULT_MAX_CONTEXT_ASSETS;

pub const ENV_USE_LOCAL_MODEL: &str = "USE_LOCAL_MODEL";
pub const ENV_MODEL_ENDPOINT: &str = "MODEL_ENDPOINT";
pub const ENV_MODEL_NAME: &str = "MODEL_NAME";
pub const ENV_MODEL_TIMEOUT: &str = "MODEL_TIMEOUT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the reference scene documents.
    pub reference_dir: PathBuf,
    /// Try the generative backend before falling back.
    pub use_local_model: bool,
    pub model_endpoint: String,
    pub model_name: String,
    pub model_timeout_secs: u64,
    /// Seed for reference picks when a prompt carries no keyword signal.
    pub seed: Option<u64>,
    pub max_context_assets: usize,
    pub max_scene_assets: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_dir: PathBuf::from("reference_scenes"),
            use_local_model: false,
            model_endpoint: "http://localhost:11434".to_string(),
            model_name: "gpt-oss-20b".to_string(),
            model_timeout_secs: 45,
            seed: None,
            max_context_assets: DEFAULT_MAX_CONTEXT_ASSETS,
            max_scene_assets: 10,
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    /// Apply overrides from a variable lookup; `std::env::var` in practice.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_USE_LOCAL_MODEL) {
            self.use_local_model = value.trim().eq_ignore_ascii_case("true");
        }
        if let Some(value) = lookup(ENV_MODEL_ENDPOINT) {
            self.model_endpoint = value;
        }
        if let Some(value) = lookup(ENV_MODEL_NAME) {
            self.model_name = value;
        }
        if let Some(value) = lookup(ENV_MODEL_TIMEOUT) {
            self.model_timeout_secs =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_MODEL_TIMEOUT.to_string(),
                    value: value.clone(),
                })?;
        }
        Ok(())
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}
