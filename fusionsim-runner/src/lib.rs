//! FusionSim Runner — ensembles, interventions and the analyses built on them.
//!
//! This crate builds on `fusionsim-core` to provide:
//! - Experiment configuration (seed, path count, model, sampler)
//! - Monte Carlo driver in summary or trajectory mode, serial or rayon-parallel
//! - `do(fusion_year)` intervention grids with finite-difference gradients
//! - Statistics: percentile bands, rank correlation, histograms, frontier
//! - Discounting with break-even rate search
//! - Calibration robustness table and social return analysis
//! - Deterministic single-path trace
//! - CSV / JSON export

pub mod config;
pub mod discount;
pub mod ensemble;
pub mod export;
pub mod intervention;
pub mod robustness;
pub mod social_return;
pub mod stats;
pub mod trace;

pub use config::ExperimentConfig;
pub use discount::{annual_increments, break_even_rate, present_value, BreakEvenSearch, DiscountError};
pub use ensemble::{
    run_ensemble, run_summary, run_trajectories, EnsembleOutput, EnsembleRun, EnsembleSummary,
    OutputMode, RunError, TrajectoryMatrix, ENSEMBLE_STREAM,
};
pub use intervention::{
    finite_difference_gradients, run_intervention_grid, run_intervention_trajectories,
    CausalGradient, InterventionPoint, InterventionResult, InterventionRun, InterventionRuns,
    SummaryStatistic, CANONICAL_GRID,
};
pub use robustness::{
    run_robustness, standard_calibrations, Calibration, CalibrationOverride, RobustnessRow,
};
pub use social_return::{
    analyse_social_return, run_social_return, standard_rates, AccelerationGain, DiscountRow,
    MeanTrajectory, NamedRate, SocialReturnConfig, SocialReturnReport, REFERENCE_COST_TRILLIONS,
};
pub use stats::{
    frontier, histogram, integer_histogram, latent_correlations, mean, median,
    outcome_histograms, percentile, percentile_bands, spearman, Correlation, FrontierConfig,
    FrontierPoint, Histogram, LatentParameter, OutcomeHistograms, PercentileBands,
    DEFAULT_BAND_LEVELS, OUTCOME_HISTOGRAM_BINS,
};
pub use trace::{trace_comparison, trace_representative, TraceComparison};
