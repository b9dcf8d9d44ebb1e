//! Monte Carlo driver — runs N independent paths and reduces them.
//!
//! Path `k` draws from its own stream `(seed, "ensemble", k)`, so results are
//! bit-identical whatever the thread count. Every experiment in this crate
//! uses the same stream label, which gives intervention grid points and
//! alternative calibrations common random numbers.

use std::time::Instant;

use fusionsim_core::{
    run_path, run_path_outcome, ConfigError, ModelConfig, ParameterSampler, PathOutcome,
    RngHierarchy, SamplerError,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ExperimentConfig;
use crate::discount::DiscountError;
use crate::stats::{mean, median};

/// Stream label shared by every ensemble.
pub const ENSEMBLE_STREAM: &str = "ensemble";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid sampler: {0}")]
    Sampler(#[from] SamplerError),

    #[error("discounting failed: {0}")]
    Discount(#[from] DiscountError),

    #[error("intervention grid is empty")]
    EmptyGrid,

    #[error("intervention grid must be finite and strictly increasing (at index {index})")]
    UnorderedGrid { index: usize },

    #[error("grid value {value} is not part of the intervention grid")]
    MissingGridValue { value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Scalar bookkeeping only.
    Summary,
    /// Full output matrix plus per-path outcomes.
    Trajectories,
}

// ─── Trajectory matrix ───────────────────────────────────────────────

/// Output values, paths × years, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryMatrix {
    start_year: i32,
    n_years: usize,
    data: Vec<f64>,
}

impl TrajectoryMatrix {
    pub fn new(start_year: i32, n_years: usize) -> Self {
        Self {
            start_year,
            n_years,
            data: Vec::new(),
        }
    }

    /// Append one path.
    ///
    /// # Panics
    /// If `row` does not cover exactly `n_years` years.
    pub fn push_row(&mut self, row: &[f64]) {
        assert_eq!(row.len(), self.n_years, "row length must match the horizon");
        self.data.extend_from_slice(row);
    }

    pub fn n_paths(&self) -> usize {
        if self.n_years == 0 {
            0
        } else {
            self.data.len() / self.n_years
        }
    }

    pub fn n_years(&self) -> usize {
        self.n_years
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn years(&self) -> Vec<i32> {
        (0..self.n_years)
            .map(|i| self.start_year + i as i32)
            .collect()
    }

    pub fn year_index(&self, year: i32) -> Option<usize> {
        let idx = year.checked_sub(self.start_year)?;
        usize::try_from(idx).ok().filter(|&i| i < self.n_years)
    }

    pub fn row(&self, path: usize) -> &[f64] {
        &self.data[path * self.n_years..(path + 1) * self.n_years]
    }

    pub fn column(&self, year_idx: usize) -> Vec<f64> {
        self.data
            .iter()
            .skip(year_idx)
            .step_by(self.n_years.max(1))
            .copied()
            .collect()
    }

    pub fn terminal_values(&self) -> Vec<f64> {
        match self.n_years {
            0 => Vec::new(),
            n => self.column(n - 1),
        }
    }

    /// Cross-path mean for each year. Empty when there are no paths.
    pub fn mean_curve(&self) -> Vec<f64> {
        let n = self.n_paths();
        if n == 0 {
            return Vec::new();
        }
        let mut sums = vec![0.0; self.n_years];
        for path in 0..n {
            for (s, v) in sums.iter_mut().zip(self.row(path)) {
                *s += v;
            }
        }
        sums.into_iter().map(|s| s / n as f64).collect()
    }
}

// ─── Summary ─────────────────────────────────────────────────────────

/// Reduced ensemble. Identical whether built from summary or trajectory mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSummary {
    pub n_paths: usize,
    pub no_downturn_count: usize,
    pub no_downturn_pct: f64,
    /// Terminal output above the abundance threshold.
    pub abundance_pct: f64,
    /// Nadir below the collapse threshold.
    pub collapse_pct: f64,
    pub never_recovered_pct: f64,
    pub median_nadir_year: Option<f64>,
    pub median_recovery_years: Option<f64>,
    pub median_terminal: Option<f64>,
    pub mean_terminal: Option<f64>,

    pub terminal_values: Vec<f64>,
    pub nadir_values: Vec<f64>,
    pub nadir_years: Vec<i32>,
    /// Recovery durations of paths that recovered and never collapsed.
    pub recovery_durations: Vec<i32>,
    /// Effective fusion year (draw plus accumulated delay).
    pub fusion_years: Vec<f64>,
    pub climate_sensitivities: Vec<f64>,
    pub brittleness: Vec<f64>,
    pub base_growth: Vec<f64>,
}

fn pct(count: usize, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        count as f64 * 100.0 / n as f64
    }
}

impl EnsembleSummary {
    pub fn from_outcomes(outcomes: &[PathOutcome], model: &ModelConfig) -> Self {
        let n = outcomes.len();
        let terminal_values: Vec<f64> = outcomes.iter().map(|o| o.terminal_value).collect();
        let nadir_values: Vec<f64> = outcomes.iter().map(|o| o.nadir_value).collect();
        let nadir_years: Vec<i32> = outcomes.iter().map(|o| o.nadir_year).collect();
        let recovery_durations: Vec<i32> = outcomes
            .iter()
            .filter_map(|o| o.recovery_duration(model.start_year))
            .collect();

        let no_downturn_count = outcomes.iter().filter(|o| o.no_downturn).count();
        let abundant = terminal_values
            .iter()
            .filter(|&&y| y > model.abundance_threshold)
            .count();
        let collapsed = nadir_values
            .iter()
            .filter(|&&y| y < model.collapse_threshold)
            .count();

        let nadir_years_f: Vec<f64> = nadir_years.iter().map(|&y| y as f64).collect();
        let durations_f: Vec<f64> = recovery_durations.iter().map(|&d| d as f64).collect();

        Self {
            n_paths: n,
            no_downturn_count,
            no_downturn_pct: pct(no_downturn_count, n),
            abundance_pct: pct(abundant, n),
            collapse_pct: pct(collapsed, n),
            never_recovered_pct: pct(n - recovery_durations.len(), n),
            median_nadir_year: median(&nadir_years_f),
            median_recovery_years: median(&durations_f),
            median_terminal: median(&terminal_values),
            mean_terminal: mean(&terminal_values),
            fusion_years: outcomes.iter().map(|o| o.effective_fusion_year).collect(),
            climate_sensitivities: outcomes.iter().map(|o| o.params.climate_sensitivity).collect(),
            brittleness: outcomes.iter().map(|o| o.params.conflict_brittleness).collect(),
            base_growth: outcomes.iter().map(|o| o.params.base_growth).collect(),
            terminal_values,
            nadir_values,
            nadir_years,
            recovery_durations,
        }
    }
}

// ─── Runs ────────────────────────────────────────────────────────────

/// Trajectory-mode result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRun {
    pub matrix: TrajectoryMatrix,
    pub outcomes: Vec<PathOutcome>,
}

impl EnsembleRun {
    pub fn summary(&self, model: &ModelConfig) -> EnsembleSummary {
        EnsembleSummary::from_outcomes(&self.outcomes, model)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleOutput {
    Summary(EnsembleSummary),
    Trajectories(EnsembleRun),
}

impl EnsembleOutput {
    pub fn summary(&self, model: &ModelConfig) -> EnsembleSummary {
        match self {
            EnsembleOutput::Summary(s) => s.clone(),
            EnsembleOutput::Trajectories(run) => run.summary(model),
        }
    }
}

/// Map `f` over path indices in order, on rayon workers if requested.
fn map_paths<T, F>(n_paths: usize, parallel: bool, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    if parallel {
        (0..n_paths).into_par_iter().map(f).collect()
    } else {
        (0..n_paths).map(f).collect()
    }
}

fn collect_outcomes(
    n_paths: usize,
    config: &ExperimentConfig,
) -> Result<Vec<PathOutcome>, RunError> {
    let sampler = ParameterSampler::new(&config.sampler)?;
    let hierarchy = RngHierarchy::new(config.seed);
    Ok(map_paths(n_paths, config.parallel, |i| {
        let mut rng = hierarchy.rng_for(ENSEMBLE_STREAM, i as u64);
        let params = sampler.sample(&mut rng);
        run_path_outcome(&params, &config.model, &mut rng)
    }))
}

fn collect_run(n_paths: usize, config: &ExperimentConfig) -> Result<EnsembleRun, RunError> {
    let sampler = ParameterSampler::new(&config.sampler)?;
    let hierarchy = RngHierarchy::new(config.seed);
    let results = map_paths(n_paths, config.parallel, |i| {
        let mut rng = hierarchy.rng_for(ENSEMBLE_STREAM, i as u64);
        let params = sampler.sample(&mut rng);
        run_path(&params, &config.model, &mut rng)
    });

    let mut matrix = TrajectoryMatrix::new(config.model.start_year, config.model.n_years);
    let mut outcomes = Vec::with_capacity(results.len());
    for result in results {
        matrix.push_row(&result.outputs());
        outcomes.push(result.outcome);
    }
    Ok(EnsembleRun { matrix, outcomes })
}

/// Run `n_paths` paths of `config` in the requested mode.
pub fn run_ensemble(
    n_paths: usize,
    config: &ExperimentConfig,
    mode: OutputMode,
) -> Result<EnsembleOutput, RunError> {
    config.model.validate()?;

    info!(
        n_paths,
        seed = config.seed,
        parallel = config.parallel,
        fusion_mu = config.sampler.fusion_mu,
        ?mode,
        "running ensemble"
    );
    let started = Instant::now();

    let output = match mode {
        OutputMode::Summary => {
            let outcomes = collect_outcomes(n_paths, config)?;
            EnsembleOutput::Summary(EnsembleSummary::from_outcomes(&outcomes, &config.model))
        }
        OutputMode::Trajectories => EnsembleOutput::Trajectories(collect_run(n_paths, config)?),
    };

    debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ensemble finished"
    );
    Ok(output)
}

/// Summary-mode run using the experiment's own path count.
pub fn run_summary(config: &ExperimentConfig) -> Result<EnsembleSummary, RunError> {
    config.validate()?;
    match run_ensemble(config.n_paths, config, OutputMode::Summary)? {
        EnsembleOutput::Summary(s) => Ok(s),
        EnsembleOutput::Trajectories(run) => Ok(run.summary(&config.model)),
    }
}

/// Trajectory-mode run using the experiment's own path count.
pub fn run_trajectories(config: &ExperimentConfig) -> Result<EnsembleRun, RunError> {
    config.validate()?;
    info!(
        n_paths = config.n_paths,
        seed = config.seed,
        fusion_mu = config.sampler.fusion_mu,
        "running trajectory ensemble"
    );
    collect_run(config.n_paths, config)
}
