//! Model configuration: every constant of the annual recurrence.
//!
//! `ModelConfig` is a flat set of named knobs. Defaults reproduce the baseline
//! calibration; partial TOML files override only the keys they name.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::StateVector;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {field} = {value} ({reason})")]
    Invalid {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, value: f64, reason: &'static str) -> Self {
        Self::Invalid {
            field,
            value,
            reason,
        }
    }
}

/// Where the temperature shock is applied relative to the zero floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseOrder {
    /// Shock is added to the increment, then the increment is floored at zero.
    /// Temperature is non-decreasing.
    ShockThenFloor,
    /// Increment is floored first and the shock added afterwards; temperature
    /// can fall by up to one shock per year (still floored at zero).
    FloorThenShock,
}

/// Which output drop feeds the velocity term of the stability update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityMode {
    /// Compares output at the start of the step with output at the stability
    /// update of the same step. Output only moves later in the step, so the
    /// term is zero.
    #[default]
    WithinStep,
    /// Uses the drop from the previous step's starting output.
    Lagged,
}

/// Endogenous fusion delay: pre-fusion crises push the arrival year later.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayFeedback {
    /// Years of delay per unit of stability shortfall below 1.
    pub stability_weight: f64,
    /// Years of delay per unit of relative output shortfall below the initial level.
    pub output_weight: f64,
}

impl Default for DelayFeedback {
    fn default() -> Self {
        Self {
            stability_weight: 0.5,
            output_weight: 0.5,
        }
    }
}

/// All knobs of the annual state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    // ── horizon ──
    pub start_year: i32,
    pub n_years: usize,
    pub initial_state: StateVector,

    // ── temperature ──
    pub forcing_coeff: f64,
    /// Linear decline of forcing per elapsed year (mitigation improvement).
    pub mitigation_rate: f64,
    pub output_reference: f64,
    pub sensitivity_reference: f64,
    pub energy_reference: f64,
    pub temperature_noise_sd: f64,
    pub noise_order: NoiseOrder,

    // ── damages ──
    pub damage_coeff: f64,
    pub damage_exponent: f64,

    // ── energy ──
    pub fusion_build_rate: f64,
    pub adoption_steepness: f64,
    pub eroi_decay: f64,
    pub warming_drag: f64,
    pub clean_ceiling: f64,
    pub clean_midpoint_year: f64,
    pub clean_steepness: f64,
    pub energy_noise_sd: f64,
    pub energy_floor: f64,
    pub energy_cap: f64,
    /// `None` disables the endogenous delay feedback (canonical).
    pub delay_feedback: Option<DelayFeedback>,

    // ── institutions ──
    pub institutional_coeff: f64,
    pub damage_buffer: f64,
    pub scarcity_coeff: f64,
    pub velocity_coeff: f64,
    pub velocity_buffer: f64,
    pub velocity_mode: VelocityMode,
    pub recovery_drift: f64,
    pub stability_max: f64,

    // ── collapse ──
    pub collapse_base_risk: f64,
    pub collapse_risk_slope: f64,
    pub collapse_threshold: f64,
    pub collapse_floor: f64,

    // ── output ──
    pub gdp_ceiling: f64,
    pub maintenance_rate: f64,
    pub temperature_reference: f64,
    pub efficiency_floor: f64,
    pub efficiency_scale: f64,

    // ── bookkeeping ──
    /// Steps that must elapse before a recovery above the initial output counts.
    pub recovery_grace_steps: usize,
    /// Terminal output above which a path counts as "abundance".
    pub abundance_threshold: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            start_year: 2026,
            n_years: 75,
            initial_state: StateVector::default(),

            forcing_coeff: 0.04,
            mitigation_rate: 0.018,
            output_reference: 100.0,
            sensitivity_reference: 3.0,
            energy_reference: 15.0,
            temperature_noise_sd: 0.04,
            noise_order: NoiseOrder::ShockThenFloor,

            damage_coeff: 0.003,
            damage_exponent: 2.6,

            fusion_build_rate: 3.5,
            adoption_steepness: 0.5,
            eroi_decay: 0.12,
            warming_drag: 0.03,
            clean_ceiling: 0.08,
            clean_midpoint_year: 2030.0,
            clean_steepness: 0.15,
            energy_noise_sd: 0.04,
            energy_floor: 1.0,
            energy_cap: 100.0,
            delay_feedback: None,

            institutional_coeff: 0.035,
            damage_buffer: 5.0,
            scarcity_coeff: 6.0,
            velocity_coeff: 8.0,
            velocity_buffer: 10.0,
            velocity_mode: VelocityMode::WithinStep,
            recovery_drift: 0.006,
            stability_max: 1.2,

            collapse_base_risk: 0.02,
            collapse_risk_slope: 0.2,
            collapse_threshold: 1.05,
            collapse_floor: 0.5,

            gdp_ceiling: 2000.0,
            maintenance_rate: 0.022,
            temperature_reference: 1.3,
            efficiency_floor: 0.5,
            efficiency_scale: 200.0,

            recovery_grace_steps: 5,
            abundance_threshold: 500.0,
        }
    }
}

impl ModelConfig {
    /// Parse a (possibly partial) TOML document and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Calendar year of step `index`.
    pub fn year_at(&self, index: usize) -> i32 {
        self.start_year + index as i32
    }

    /// Last simulated calendar year.
    pub fn end_year(&self) -> i32 {
        self.year_at(self.n_years.saturating_sub(1))
    }

    /// All simulated calendar years, in order.
    pub fn years(&self) -> Vec<i32> {
        (0..self.n_years).map(|i| self.year_at(i)).collect()
    }

    /// Deterministic variant: both noise terms switched off.
    pub fn without_noise(mut self) -> Self {
        self.temperature_noise_sd = 0.0;
        self.energy_noise_sd = 0.0;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_years == 0 {
            return Err(ConfigError::invalid("n_years", 0.0, "must be > 0"));
        }
        let positive = [
            ("output_reference", self.output_reference),
            ("sensitivity_reference", self.sensitivity_reference),
            ("energy_reference", self.energy_reference),
            ("adoption_steepness", self.adoption_steepness),
            ("gdp_ceiling", self.gdp_ceiling),
            ("temperature_reference", self.temperature_reference),
            ("efficiency_scale", self.efficiency_scale),
            ("energy_floor", self.energy_floor),
            ("stability_max", self.stability_max),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(field, value, "must be finite and > 0"));
            }
        }
        let non_negative = [
            ("temperature_noise_sd", self.temperature_noise_sd),
            ("energy_noise_sd", self.energy_noise_sd),
            ("damage_coeff", self.damage_coeff),
            ("damage_exponent", self.damage_exponent),
            ("institutional_coeff", self.institutional_coeff),
            ("collapse_floor", self.collapse_floor),
            ("collapse_threshold", self.collapse_threshold),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(field, value, "must be finite and >= 0"));
            }
        }
        if self.energy_cap < self.energy_floor {
            return Err(ConfigError::invalid(
                "energy_cap",
                self.energy_cap,
                "must be >= energy_floor",
            ));
        }
        if self.collapse_floor > self.collapse_threshold {
            return Err(ConfigError::invalid(
                "collapse_floor",
                self.collapse_floor,
                "must not exceed collapse_threshold",
            ));
        }
        let init = &self.initial_state;
        if !(init.energy >= self.energy_floor && init.energy <= self.energy_cap) {
            return Err(ConfigError::invalid(
                "initial_state.energy",
                init.energy,
                "outside [energy_floor, energy_cap]",
            ));
        }
        if !(init.stability >= 0.0 && init.stability <= self.stability_max) {
            return Err(ConfigError::invalid(
                "initial_state.stability",
                init.stability,
                "outside [0, stability_max]",
            ));
        }
        if !(init.output > 0.0 && init.temperature >= 0.0) {
            return Err(ConfigError::invalid(
                "initial_state.output",
                init.output,
                "output must be > 0 and temperature >= 0",
            ));
        }
        Ok(())
    }
}
