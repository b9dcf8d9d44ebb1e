//! Social return on fusion acceleration.
//!
//! Runs full-trajectory interventions, measures how much cumulative output
//! one year of earlier fusion buys, and discounts that stream against a
//! reference programme cost.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ExperimentConfig;
use crate::discount::{
    annual_increments, break_even_rate, present_value, BreakEvenSearch, DiscountError,
};
use crate::ensemble::RunError;
use crate::intervention::{run_intervention_trajectories, InterventionRuns, CANONICAL_GRID};

/// Cumulative global fusion spend, in trillions.
pub const REFERENCE_COST_TRILLIONS: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRate {
    pub rate: f64,
    pub label: String,
}

pub fn standard_rates() -> Vec<NamedRate> {
    [
        (0.014, "Stern Review"),
        (0.03, "Ramsey moderate"),
        (0.05, "Nordhaus"),
        (0.10, "High"),
        (0.15, "Very high"),
        (0.20, "Extreme"),
        (0.30, "Absurd"),
        (0.50, "Inconceivable"),
    ]
    .into_iter()
    .map(|(rate, label)| NamedRate {
        rate,
        label: label.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialReturnConfig {
    pub grid: Vec<f64>,
    /// Acceleration window used for the discounted stream.
    pub window_early: f64,
    pub window_late: f64,
    pub reference_cost: f64,
    pub rates: Vec<NamedRate>,
    pub search: BreakEvenSearch,
}

impl Default for SocialReturnConfig {
    fn default() -> Self {
        Self {
            grid: CANONICAL_GRID.to_vec(),
            window_early: 2040.0,
            window_late: 2050.0,
            reference_cost: REFERENCE_COST_TRILLIONS,
            rates: standard_rates(),
            search: BreakEvenSearch::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanTrajectory {
    pub fusion_year: f64,
    pub curve: Vec<f64>,
    pub terminal: f64,
    /// Sum of annual output (T·yr).
    pub cumulative: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationGain {
    pub early: f64,
    pub late: f64,
    pub terminal_gain: f64,
    pub cumulative_gain: f64,
    /// Cumulative gain per year of acceleration.
    pub gain_per_year: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRow {
    pub rate: f64,
    pub label: String,
    pub present_value: f64,
    pub ratio_to_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialReturnReport {
    pub years: Vec<i32>,
    pub base_year: i32,
    pub mean_trajectories: Vec<MeanTrajectory>,
    pub intervals: Vec<AccelerationGain>,
    pub window: AccelerationGain,
    pub increments: Vec<f64>,
    pub discount_table: Vec<DiscountRow>,
    /// `None` when no rate in the search bracket equates PV and cost.
    pub break_even_rate: Option<f64>,
    pub reference_cost: f64,
}

impl SocialReturnReport {
    /// How many times larger the cumulative gain is than the terminal-only
    /// gain for the window.
    pub fn cumulative_to_terminal_ratio(&self) -> Option<f64> {
        (self.window.terminal_gain != 0.0)
            .then(|| self.window.cumulative_gain / self.window.terminal_gain)
    }

    pub fn present_value_at(&self, rate: f64) -> Option<f64> {
        self.discount_table
            .iter()
            .find(|row| row.rate == rate)
            .map(|row| row.present_value)
    }
}

fn mean_trajectory(fusion_year: f64, curve: Vec<f64>) -> MeanTrajectory {
    MeanTrajectory {
        fusion_year,
        terminal: curve.last().copied().unwrap_or(0.0),
        cumulative: curve.iter().sum(),
        curve,
    }
}

fn gain(early: &MeanTrajectory, late: &MeanTrajectory) -> AccelerationGain {
    let delta = late.fusion_year - early.fusion_year;
    let cumulative_gain = early.cumulative - late.cumulative;
    AccelerationGain {
        early: early.fusion_year,
        late: late.fusion_year,
        terminal_gain: early.terminal - late.terminal,
        cumulative_gain,
        gain_per_year: cumulative_gain / delta,
    }
}

/// Reduce already-computed trajectory interventions into the report.
pub fn analyse_social_return(
    runs: &InterventionRuns,
    config: &SocialReturnConfig,
) -> Result<SocialReturnReport, RunError> {
    let first = runs.points.first().ok_or(RunError::EmptyGrid)?;
    let years = first.run.matrix.years();
    let base_year = first.run.matrix.start_year();

    let mean_trajectories: Vec<MeanTrajectory> = runs
        .points
        .iter()
        .map(|p| mean_trajectory(p.value, p.run.matrix.mean_curve()))
        .collect();

    let intervals = mean_trajectories
        .windows(2)
        .map(|w| gain(&w[0], &w[1]))
        .collect();

    let find = |value: f64| {
        mean_trajectories
            .iter()
            .find(|m| m.fusion_year == value)
            .ok_or(RunError::MissingGridValue { value })
    };
    let early = find(config.window_early)?;
    let late = find(config.window_late)?;
    let window = gain(early, late);
    let increments = annual_increments(&early.curve, &late.curve, late.fusion_year - early.fusion_year);

    let discount_table = config
        .rates
        .iter()
        .map(|named| {
            let pv = present_value(&increments, &years, base_year, named.rate)?;
            Ok(DiscountRow {
                rate: named.rate,
                label: named.label.clone(),
                present_value: pv,
                ratio_to_cost: pv / config.reference_cost,
            })
        })
        .collect::<Result<Vec<_>, DiscountError>>()?;

    let break_even = match break_even_rate(
        &increments,
        &years,
        base_year,
        config.reference_cost,
        &config.search,
    ) {
        Ok(r) => Some(r),
        Err(e @ DiscountError::NoSignChange { .. }) => {
            warn!(error = %e, "break-even discount rate not found");
            None
        }
        Err(e) => return Err(e.into()),
    };

    Ok(SocialReturnReport {
        years,
        base_year,
        mean_trajectories,
        intervals,
        window,
        increments,
        discount_table,
        break_even_rate: break_even,
        reference_cost: config.reference_cost,
    })
}

pub fn run_social_return(
    experiment: &ExperimentConfig,
    config: &SocialReturnConfig,
) -> Result<SocialReturnReport, RunError> {
    for value in [config.window_early, config.window_late] {
        if !config.grid.contains(&value) {
            return Err(RunError::MissingGridValue { value });
        }
    }
    let runs = run_intervention_trajectories(&config.grid, experiment)?;
    let report = analyse_social_return(&runs, config)?;
    info!(
        gain_per_year = report.window.gain_per_year,
        break_even_rate = report.break_even_rate,
        "social return computed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_uses_cumulative_difference() {
        let early = mean_trajectory(2040.0, vec![1.0, 3.0, 6.0]);
        let late = mean_trajectory(2050.0, vec![1.0, 2.0, 3.0]);
        let g = gain(&early, &late);
        assert_eq!(g.terminal_gain, 3.0);
        assert_eq!(g.cumulative_gain, 4.0);
        assert!((g.gain_per_year - 0.4).abs() < 1e-12);
    }

    #[test]
    fn window_must_be_in_grid() {
        let cfg = SocialReturnConfig {
            grid: vec![2030.0, 2035.0],
            ..SocialReturnConfig::default()
        };
        let err = run_social_return(&ExperimentConfig::default().with_paths(4), &cfg).unwrap_err();
        assert!(matches!(err, RunError::MissingGridValue { value } if value == 2040.0));
    }

    #[test]
    fn standard_rates_ascending() {
        let rates = standard_rates();
        assert_eq!(rates.len(), 8);
        assert!(rates.windows(2).all(|w| w[0].rate < w[1].rate));
        assert_eq!(rates[0].rate, 0.014);
    }

    #[test]
    fn small_run_produces_report() {
        let cfg = SocialReturnConfig {
            grid: vec![2040.0, 2050.0],
            ..SocialReturnConfig::default()
        };
        let exp = ExperimentConfig::default().with_paths(40).with_seed(123);
        let report = run_social_return(&exp, &cfg).unwrap();
        assert_eq!(report.mean_trajectories.len(), 2);
        assert_eq!(report.intervals.len(), 1);
        assert_eq!(report.increments.len(), exp.model.n_years);
        assert_eq!(report.discount_table.len(), 8);
        assert_eq!(report.base_year, 2026);
        assert_eq!(report.intervals[0], report.window);
        // PV falls as the rate rises whenever the stream is positive throughout.
        if report.increments.iter().all(|&i| i > 0.0) {
            let pvs: Vec<f64> = report.discount_table.iter().map(|r| r.present_value).collect();
            assert!(pvs.windows(2).all(|w| w[0] > w[1]));
        }
    }
}
