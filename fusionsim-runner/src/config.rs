//! Serializable experiment configuration.

use std::path::Path;

use fusionsim_core::{ConfigError, ModelConfig, SamplerConfig};
use serde::{Deserialize, Serialize};

/// Everything needed to reproduce an ensemble run.
///
/// ```toml
/// seed = 42
/// n_paths = 10000
///
/// [model]
/// damage_exponent = 2.6
///
/// [sampler]
/// fusion_mu = 2035.0
/// fusion_sigma = 7.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Master seed for the RNG hierarchy.
    pub seed: u64,
    pub n_paths: usize,
    /// Fan paths out across rayon workers. Results are identical either way.
    pub parallel: bool,
    pub model: ModelConfig,
    pub sampler: SamplerConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_paths: 10_000,
            parallel: true,
            model: ModelConfig::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_paths == 0 {
            return Err(ConfigError::Invalid {
                field: "n_paths",
                value: 0.0,
                reason: "must be > 0",
            });
        }
        self.model.validate()
    }

    pub fn with_paths(mut self, n_paths: usize) -> Self {
        self.n_paths = n_paths;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Copy of this experiment under `do(fusion_year = value)`.
    pub fn pinned(&self, fusion_year: f64) -> Self {
        Self {
            sampler: self.sampler.pinned(fusion_year),
            ..self.clone()
        }
    }
}
