//! Causal interventions on fusion timing.
//!
//! Each grid value `v` runs the ensemble under `do(fusion_year = v)`: the
//! fusion year is pinned (sigma 1e-3) and every other distribution is
//! untouched. All grid points share per-path streams and every simulated
//! year consumes a fixed number of draws, so path `k` sees the same climate
//! sensitivity, brittleness, growth and yearly shocks at every point.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ExperimentConfig;
use crate::ensemble::{run_summary, run_trajectories, EnsembleRun, EnsembleSummary, RunError};

/// 2030, 2035, …, 2060.
pub const CANONICAL_GRID: [f64; 7] = [2030.0, 2035.0, 2040.0, 2045.0, 2050.0, 2055.0, 2060.0];

/// Scalar statistic of an ensemble summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatistic {
    MeanTerminal,
    MedianTerminal,
    AbundancePct,
    CollapsePct,
    NoDownturnPct,
    NeverRecoveredPct,
    MedianRecoveryYears,
}

impl SummaryStatistic {
    pub const ALL: [SummaryStatistic; 7] = [
        SummaryStatistic::MeanTerminal,
        SummaryStatistic::MedianTerminal,
        SummaryStatistic::AbundancePct,
        SummaryStatistic::CollapsePct,
        SummaryStatistic::NoDownturnPct,
        SummaryStatistic::NeverRecoveredPct,
        SummaryStatistic::MedianRecoveryYears,
    ];

    pub fn of(&self, summary: &EnsembleSummary) -> Option<f64> {
        match self {
            SummaryStatistic::MeanTerminal => summary.mean_terminal,
            SummaryStatistic::MedianTerminal => summary.median_terminal,
            SummaryStatistic::AbundancePct => Some(summary.abundance_pct),
            SummaryStatistic::CollapsePct => Some(summary.collapse_pct),
            SummaryStatistic::NoDownturnPct => Some(summary.no_downturn_pct),
            SummaryStatistic::NeverRecoveredPct => Some(summary.never_recovered_pct),
            SummaryStatistic::MedianRecoveryYears => summary.median_recovery_years,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SummaryStatistic::MeanTerminal => "mean_terminal",
            SummaryStatistic::MedianTerminal => "median_terminal",
            SummaryStatistic::AbundancePct => "abundance_pct",
            SummaryStatistic::CollapsePct => "collapse_pct",
            SummaryStatistic::NoDownturnPct => "no_downturn_pct",
            SummaryStatistic::NeverRecoveredPct => "never_recovered_pct",
            SummaryStatistic::MedianRecoveryYears => "median_recovery_years",
        }
    }
}

/// Finite difference between two adjacent grid points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CausalGradient {
    pub lower: f64,
    pub upper: f64,
    pub midpoint: f64,
    /// `None` when either endpoint statistic is undefined.
    pub gradient: Option<f64>,
}

/// `(stat[i+1] - stat[i]) / (value[i+1] - value[i])` at each interval
/// midpoint.
pub fn finite_difference_gradients(values: &[f64], stats: &[Option<f64>]) -> Vec<CausalGradient> {
    values
        .windows(2)
        .zip(stats.windows(2))
        .map(|(v, s)| CausalGradient {
            lower: v[0],
            upper: v[1],
            midpoint: (v[0] + v[1]) / 2.0,
            gradient: match (s[0], s[1]) {
                (Some(a), Some(b)) => Some((b - a) / (v[1] - v[0])),
                _ => None,
            },
        })
        .collect()
}

fn validate_grid(values: &[f64]) -> Result<(), RunError> {
    if values.is_empty() {
        return Err(RunError::EmptyGrid);
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(RunError::UnorderedGrid { index });
    }
    if let Some(i) = values.windows(2).position(|w| w[1] <= w[0]) {
        return Err(RunError::UnorderedGrid { index: i + 1 });
    }
    Ok(())
}

// ─── Summary grid ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionPoint {
    pub value: f64,
    pub summary: EnsembleSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionResult {
    pub points: Vec<InterventionPoint>,
}

impl InterventionResult {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn get(&self, value: f64) -> Option<&EnsembleSummary> {
        self.points
            .iter()
            .find(|p| p.value == value)
            .map(|p| &p.summary)
    }

    pub fn statistic(&self, stat: SummaryStatistic) -> Vec<Option<f64>> {
        self.points.iter().map(|p| stat.of(&p.summary)).collect()
    }

    pub fn gradients(&self, stat: SummaryStatistic) -> Vec<CausalGradient> {
        finite_difference_gradients(&self.values(), &self.statistic(stat))
    }
}

/// Summary-mode ensemble at every grid value.
pub fn run_intervention_grid(
    values: &[f64],
    config: &ExperimentConfig,
) -> Result<InterventionResult, RunError> {
    validate_grid(values)?;
    info!(points = values.len(), n_paths = config.n_paths, "running intervention grid");

    let points = values
        .iter()
        .map(|&value| {
            let summary = run_summary(&config.pinned(value))?;
            info!(
                fusion_year = value,
                mean_terminal = summary.mean_terminal,
                collapse_pct = summary.collapse_pct,
                "intervention point done"
            );
            Ok(InterventionPoint { value, summary })
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    Ok(InterventionResult { points })
}

// ─── Trajectory grid ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRun {
    pub value: f64,
    pub run: EnsembleRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRuns {
    pub points: Vec<InterventionRun>,
}

impl InterventionRuns {
    pub fn get(&self, value: f64) -> Option<&EnsembleRun> {
        self.points
            .iter()
            .find(|p| p.value == value)
            .map(|p| &p.run)
    }
}

/// Trajectory-mode ensemble at every grid value.
pub fn run_intervention_trajectories(
    values: &[f64],
    config: &ExperimentConfig,
) -> Result<InterventionRuns, RunError> {
    validate_grid(values)?;
    info!(points = values.len(), n_paths = config.n_paths, "running trajectory intervention grid");

    let points = values
        .iter()
        .map(|&value| {
            Ok(InterventionRun {
                value,
                run: run_trajectories(&config.pinned(value))?,
            })
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    Ok(InterventionRuns { points })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradients_at_midpoints() {
        let g = finite_difference_gradients(
            &[2030.0, 2040.0, 2050.0],
            &[Some(300.0), Some(200.0), None],
        );
        assert_eq!(g.len(), 2);
        assert_eq!(g[0].midpoint, 2035.0);
        assert_eq!(g[0].gradient, Some(-10.0));
        assert_eq!(g[1].midpoint, 2045.0);
        assert_eq!(g[1].gradient, None);
    }

    #[test]
    fn single_point_has_no_gradient() {
        assert!(finite_difference_gradients(&[2040.0], &[Some(1.0)]).is_empty());
    }

    #[test]
    fn grid_validation() {
        let cfg = ExperimentConfig::default().with_paths(4);
        assert!(matches!(run_intervention_grid(&[], &cfg), Err(RunError::EmptyGrid)));
        assert!(matches!(
            run_intervention_grid(&[2040.0, 2030.0], &cfg),
            Err(RunError::UnorderedGrid { index: 1 })
        ));
        assert!(matches!(
            run_intervention_grid(&[2030.0, f64::NAN], &cfg),
            Err(RunError::UnorderedGrid { index: 1 })
        ));
    }

    #[test]
    fn grid_points_share_latent_draws() {
        let cfg = ExperimentConfig::default().with_paths(32).with_seed(5);
        let result = run_intervention_grid(&[2030.0, 2050.0], &cfg).unwrap();
        let a = &result.points[0].summary;
        let b = &result.points[1].summary;
        assert_eq!(a.climate_sensitivities, b.climate_sensitivities);
        assert_eq!(a.brittleness, b.brittleness);
        assert_eq!(a.base_growth, b.base_growth);
    }

    #[test]
    fn pinned_fusion_year_is_tight() {
        let cfg = ExperimentConfig::default().with_paths(50);
        let result = run_intervention_grid(&[2040.0], &cfg).unwrap();
        let summary = result.get(2040.0).unwrap();
        for fy in &summary.fusion_years {
            assert!((fy - 2040.0).abs() < 0.01, "{fy}");
        }
    }

    #[test]
    fn statistic_labels_unique() {
        let mut labels: Vec<_> = SummaryStatistic::ALL.iter().map(|s| s.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), SummaryStatistic::ALL.len());
    }
}
