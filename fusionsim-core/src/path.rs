//! Path runner: drives the simulator across the horizon for one path.
//!
//! Stops at the first collapse and forward-fills the trajectory with the last
//! state so every path has exactly `n_years` entries. Tracks the nadir, the
//! no-downturn flag and the first recovery above the initial output.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::domain::{CollapseCause, ParameterDraw, PathState, StateVector, StepFlows};
use crate::simulator::PathSimulator;

/// Scalar summary of one path. Produced in every mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathOutcome {
    pub params: ParameterDraw,
    /// Fusion year plus any accumulated endogenous delay.
    pub effective_fusion_year: f64,
    pub collapsed: bool,
    pub collapse_year: Option<i32>,
    pub collapse_cause: Option<CollapseCause>,
    pub nadir_value: f64,
    /// First year the nadir value was reached.
    pub nadir_year: i32,
    /// First year after the grace period with output above its initial value.
    pub recovered_year: Option<i32>,
    /// True if output never dropped below its initial value.
    pub no_downturn: bool,
    pub terminal_value: f64,
}

impl PathOutcome {
    /// Years from `start_year` until recovery; `None` if the path never
    /// recovered or collapsed at any point.
    pub fn recovery_duration(&self, start_year: i32) -> Option<i32> {
        match self.recovered_year {
            Some(year) if !self.collapsed => Some(year - start_year),
            _ => None,
        }
    }
}

/// Full result of one path: forward-filled trajectory plus its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub trajectory: Vec<StateVector>,
    pub outcome: PathOutcome,
}

impl PathResult {
    /// Output series, one value per year.
    pub fn outputs(&self) -> Vec<f64> {
        self.trajectory.iter().map(|s| s.output).collect()
    }
}

/// One computed year of a traced path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub year: i32,
    pub state: StateVector,
    pub flows: StepFlows,
}

/// Year-by-year trace including intermediate flows. Not forward-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathTrace {
    pub steps: Vec<TraceStep>,
    pub outcome: PathOutcome,
}

// ─── Tracking ────────────────────────────────────────────────────────

struct Tracker {
    initial_output: f64,
    grace_steps: usize,
    nadir_value: f64,
    nadir_year: i32,
    recovered_year: Option<i32>,
    no_downturn: bool,
}

impl Tracker {
    fn new(config: &ModelConfig) -> Self {
        Self {
            initial_output: config.initial_state.output,
            grace_steps: config.recovery_grace_steps,
            nadir_value: f64::INFINITY,
            nadir_year: config.start_year,
            recovered_year: None,
            no_downturn: true,
        }
    }

    fn observe(&mut self, step_index: usize, year: i32, output: f64) {
        if output < self.nadir_value {
            self.nadir_value = output;
            self.nadir_year = year;
        }
        if output < self.initial_output {
            self.no_downturn = false;
        }
        if self.recovered_year.is_none()
            && step_index > self.grace_steps
            && output > self.initial_output
        {
            self.recovered_year = Some(year);
        }
    }
}

/// Core loop shared by every mode. `on_step` sees each computed year.
fn drive<R, F>(params: &ParameterDraw, config: &ModelConfig, rng: &mut R, mut on_step: F) -> PathOutcome
where
    R: Rng + ?Sized,
    F: FnMut(i32, &StateVector, &StepFlows),
{
    let sim = PathSimulator::new(config, params);
    let mut state = PathState::new(config.initial_state);
    let mut tracker = Tracker::new(config);
    let mut collapse_year = None;
    let mut collapse_cause = None;

    for step_index in 0..config.n_years {
        let year = config.year_at(step_index);
        let out = sim.step(&mut state, step_index, rng);
        on_step(year, &state.vector, &out.flows);
        tracker.observe(step_index, year, state.vector.output);

        if let Some(cause) = out.collapse {
            collapse_year = Some(year);
            collapse_cause = Some(cause);
            break;
        }
    }

    PathOutcome {
        params: *params,
        effective_fusion_year: params.fusion_year + state.fusion_delay,
        collapsed: state.collapsed,
        collapse_year,
        collapse_cause,
        nadir_value: tracker.nadir_value,
        nadir_year: tracker.nadir_year,
        recovered_year: tracker.recovered_year,
        no_downturn: tracker.no_downturn,
        terminal_value: state.vector.output,
    }
}

// ─── Entry points ────────────────────────────────────────────────────

/// Run one path and keep its forward-filled trajectory.
pub fn run_path<R: Rng + ?Sized>(
    params: &ParameterDraw,
    config: &ModelConfig,
    rng: &mut R,
) -> PathResult {
    let mut trajectory = Vec::with_capacity(config.n_years);
    let outcome = drive(params, config, rng, |_, state, _| trajectory.push(*state));

    let last = trajectory.last().copied().unwrap_or(config.initial_state);
    trajectory.resize(config.n_years, last);

    PathResult {
        trajectory,
        outcome,
    }
}

/// Run one path keeping only scalar bookkeeping.
pub fn run_path_outcome<R: Rng + ?Sized>(
    params: &ParameterDraw,
    config: &ModelConfig,
    rng: &mut R,
) -> PathOutcome {
    drive(params, config, rng, |_, _, _| {})
}

/// Run one path recording every computed year with its flows.
pub fn trace_path<R: Rng + ?Sized>(
    params: &ParameterDraw,
    config: &ModelConfig,
    rng: &mut R,
) -> PathTrace {
    let mut steps = Vec::with_capacity(config.n_years);
    let outcome = drive(params, config, rng, |year, state, flows| {
        steps.push(TraceStep {
            year,
            state: *state,
            flows: *flows,
        })
    });
    PathTrace { steps, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(fusion_year: f64, growth: f64) -> ParameterDraw {
        ParameterDraw {
            fusion_year,
            climate_sensitivity: 3.0,
            conflict_brittleness: 0.175,
            base_growth: growth,
        }
    }

    #[test]
    fn trajectory_always_full_length() {
        let cfg = ModelConfig::default();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let r = run_path(&params(2035.0, 0.028), &cfg, &mut rng);
            assert_eq!(r.trajectory.len(), cfg.n_years);
        }
    }

    #[test]
    fn collapsed_path_is_forward_filled() {
        let cfg = ModelConfig::default().without_noise();
        let p = ParameterDraw {
            conflict_brittleness: 0.0,
            ..params(2100.0, -0.9)
        };
        let mut rng = StdRng::seed_from_u64(1);
        let r = run_path(&p, &cfg, &mut rng);
        assert!(r.outcome.collapsed);
        let year = r.outcome.collapse_year.unwrap();
        let idx = (year - cfg.start_year) as usize;
        for s in &r.trajectory[idx..] {
            assert_eq!(*s, r.trajectory[idx]);
            assert_eq!(s.output, 0.5);
        }
        assert_eq!(r.outcome.terminal_value, 0.5);
        assert_eq!(r.outcome.nadir_value, 0.5);
        assert_eq!(r.outcome.nadir_year, year);
        assert!(!r.outcome.no_downturn);
        assert_eq!(r.outcome.recovery_duration(cfg.start_year), None);
    }

    #[test]
    fn outcome_matches_full_run() {
        let cfg = ModelConfig::default();
        let p = params(2038.0, 0.03);
        let full = run_path(&p, &cfg, &mut StdRng::seed_from_u64(77));
        let summary = run_path_outcome(&p, &cfg, &mut StdRng::seed_from_u64(77));
        assert_eq!(full.outcome, summary);
    }

    #[test]
    fn nadir_and_terminal_agree_with_trajectory() {
        let cfg = ModelConfig::default();
        let p = params(2045.0, 0.025);
        let r = run_path(&p, &cfg, &mut StdRng::seed_from_u64(3));
        let outputs = r.outputs();
        let min = outputs.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(r.outcome.nadir_value, min);
        let first_idx = outputs.iter().position(|&y| y == min).unwrap();
        assert_eq!(r.outcome.nadir_year, cfg.year_at(first_idx));
        assert_eq!(r.outcome.terminal_value, *outputs.last().unwrap());
    }

    #[test]
    fn recovery_respects_grace_period() {
        let cfg = ModelConfig::default().without_noise();
        let p = ParameterDraw {
            conflict_brittleness: 0.0,
            ..params(2026.0, 0.05)
        };
        let r = run_path(&p, &cfg, &mut StdRng::seed_from_u64(0));
        if let Some(year) = r.outcome.recovered_year {
            assert!(year - cfg.start_year > cfg.recovery_grace_steps as i32);
            let idx = (year - cfg.start_year) as usize;
            assert!(r.trajectory[idx].output > cfg.initial_state.output);
        }
    }

    #[test]
    fn no_downturn_flag_consistent_with_trajectory() {
        let cfg = ModelConfig::default();
        for seed in 0..20 {
            let r = run_path(&params(2030.0, 0.035), &cfg, &mut StdRng::seed_from_u64(seed));
            let dipped = r.outputs().iter().any(|&y| y < cfg.initial_state.output);
            assert_eq!(r.outcome.no_downturn, !dipped);
        }
    }

    #[test]
    fn trace_records_computed_years_only() {
        let cfg = ModelConfig::default().without_noise();
        let p = ParameterDraw {
            conflict_brittleness: 0.0,
            ..params(2100.0, -0.9)
        };
        let trace = trace_path(&p, &cfg, &mut StdRng::seed_from_u64(0));
        let collapse_year = trace.outcome.collapse_year.unwrap();
        assert_eq!(trace.steps.last().unwrap().year, collapse_year);
        assert!(trace.steps.len() < cfg.n_years);
    }
}
