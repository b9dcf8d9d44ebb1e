//! Latent parameter sampling and the `do(fusion_year = v)` intervention.
//!
//! Each path draws four independent latents, in a fixed order so a path's
//! random stream is consumed identically whatever the distribution parameters:
//! fusion year (normal), climate sensitivity (normal), conflict brittleness
//! (uniform), base growth (normal).
//!
//! An interventional draw is the same sampler with the fusion-year spread
//! collapsed to [`PIN_SIGMA`]; every other latent stays random.

use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError, Uniform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ParameterDraw;

/// Fusion-year spread used for interventional runs.
pub const PIN_SIGMA: f64 = 1e-3;

/// Errors from building a sampler.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("invalid normal distribution for {field}: {source}")]
    Normal {
        field: &'static str,
        #[source]
        source: NormalError,
    },
    #[error("invalid brittleness range [{lo}, {hi}]")]
    BrittlenessRange { lo: f64, hi: f64 },
}

/// Distribution parameters for the latent draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub fusion_mu: f64,
    pub fusion_sigma: f64,
    pub csens_mu: f64,
    pub csens_sigma: f64,
    pub brit_lo: f64,
    pub brit_hi: f64,
    pub growth_mu: f64,
    pub growth_sigma: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            fusion_mu: 2035.0,
            fusion_sigma: 7.0,
            csens_mu: 3.0,
            csens_sigma: 0.4,
            brit_lo: 0.1,
            brit_hi: 0.25,
            growth_mu: 0.028,
            growth_sigma: 0.006,
        }
    }
}

impl SamplerConfig {
    /// Interventional copy: fusion year pinned to `fusion_year`, all other
    /// distributions unchanged.
    pub fn pinned(&self, fusion_year: f64) -> Self {
        Self {
            fusion_mu: fusion_year,
            fusion_sigma: PIN_SIGMA,
            ..self.clone()
        }
    }

    /// Zero-variance sampler: every draw equals the distribution centres.
    pub fn degenerate(&self) -> Self {
        let brittleness = 0.5 * (self.brit_lo + self.brit_hi);
        Self {
            fusion_sigma: 0.0,
            csens_sigma: 0.0,
            brit_lo: brittleness,
            brit_hi: brittleness,
            growth_sigma: 0.0,
            ..self.clone()
        }
    }

    /// Copy with brittleness fixed at `value`.
    pub fn with_brittleness(&self, value: f64) -> Self {
        Self {
            brit_lo: value,
            brit_hi: value,
            ..self.clone()
        }
    }

    /// The draw every path would get from [`SamplerConfig::degenerate`].
    pub fn mean_draw(&self) -> ParameterDraw {
        ParameterDraw {
            fusion_year: self.fusion_mu,
            climate_sensitivity: self.csens_mu,
            conflict_brittleness: 0.5 * (self.brit_lo + self.brit_hi),
            base_growth: self.growth_mu,
        }
    }
}

/// Draws [`ParameterDraw`]s from a validated [`SamplerConfig`].
#[derive(Debug, Clone)]
pub struct ParameterSampler {
    fusion: Normal<f64>,
    sensitivity: Normal<f64>,
    brittleness: Uniform<f64>,
    growth: Normal<f64>,
}

impl ParameterSampler {
    pub fn new(config: &SamplerConfig) -> Result<Self, SamplerError> {
        let normal = |field: &'static str, mu: f64, sigma: f64| {
            Normal::new(mu, sigma).map_err(|source| SamplerError::Normal { field, source })
        };
        if !(config.brit_lo.is_finite() && config.brit_hi.is_finite())
            || config.brit_lo > config.brit_hi
        {
            return Err(SamplerError::BrittlenessRange {
                lo: config.brit_lo,
                hi: config.brit_hi,
            });
        }
        Ok(Self {
            fusion: normal("fusion_year", config.fusion_mu, config.fusion_sigma)?,
            sensitivity: normal("climate_sensitivity", config.csens_mu, config.csens_sigma)?,
            brittleness: Uniform::new_inclusive(config.brit_lo, config.brit_hi),
            growth: normal("base_growth", config.growth_mu, config.growth_sigma)?,
        })
    }

    /// Draw one path's latent parameters from the caller's stream.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterDraw {
        let fusion_year = self.fusion.sample(rng);
        let climate_sensitivity = self.sensitivity.sample(rng);
        let conflict_brittleness = self.brittleness.sample(rng);
        let base_growth = self.growth.sample(rng);
        ParameterDraw {
            fusion_year,
            climate_sensitivity,
            conflict_brittleness,
            base_growth,
        }
    }
}
