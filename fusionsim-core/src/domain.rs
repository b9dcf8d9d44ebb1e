//! Domain types: per-year state, per-path latent draw, per-step flows.

use serde::{Deserialize, Serialize};

/// The four coupled model variables for one path in one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    /// Temperature anomaly (°C), non-negative.
    pub temperature: f64,
    /// Energy capacity index, clamped to `[energy_floor, energy_cap]`.
    pub energy: f64,
    /// Economic output, trillions. Never negative.
    pub output: f64,
    /// Institutional stability index, clamped to `[0, stability_max]`.
    pub stability: f64,
}

impl Default for StateVector {
    fn default() -> Self {
        Self {
            temperature: 1.3,
            energy: 15.0,
            output: 105.0,
            stability: 1.0,
        }
    }
}

/// Latent parameters drawn once per path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterDraw {
    /// Year commercial fusion becomes available.
    pub fusion_year: f64,
    pub climate_sensitivity: f64,
    /// Stability level below which collapse risk switches on.
    pub conflict_brittleness: f64,
    pub base_growth: f64,
}

/// Mutable per-path simulation state advanced in place by the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathState {
    pub vector: StateVector,
    /// Output at the start of the previous step (drives the lagged velocity term).
    pub previous_output: f64,
    /// Accumulated endogenous fusion delay in years (zero unless enabled).
    pub fusion_delay: f64,
    /// Sticky: once set, output is frozen at the collapse floor.
    pub collapsed: bool,
}

impl PathState {
    pub fn new(initial: StateVector) -> Self {
        Self {
            vector: initial,
            previous_output: initial.output,
            fusion_delay: 0.0,
            collapsed: false,
        }
    }
}

/// How a collapse was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseCause {
    /// Stability fell below brittleness and the risk draw succeeded.
    Conflict,
    /// Output fell below the collapse threshold.
    OutputThreshold,
}

/// Intermediate quantities of one annual step, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepFlows {
    pub damages: f64,
    pub investment: f64,
    pub maintenance: f64,
    pub growth_dampener: f64,
    /// Relative output drop fed into the stability update.
    pub velocity: f64,
    /// Fusion adoption share this year (0 before fusion).
    pub fusion_share: f64,
    pub effective_fusion_year: f64,
}

/// Result of one call to the simulator's step function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub flows: StepFlows,
    /// Set only on the step where collapse first triggered.
    pub collapse: Option<CollapseCause>,
}
