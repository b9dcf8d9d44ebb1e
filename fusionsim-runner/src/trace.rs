//! Deterministic diagnostic trace of one representative path.
//!
//! Noise is switched off and every latent parameter sits at its mean except
//! the fusion year, which is set explicitly. The result exposes the per-year
//! flows behind the state vector. [`trace_comparison`] runs that same path
//! under several fusion years so they can be read side by side.

use fusionsim_core::{trace_path, PathTrace, RngHierarchy, StateVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ExperimentConfig;

const TRACE_STREAM: &str = "trace";

pub fn trace_representative(config: &ExperimentConfig, fusion_year: f64) -> PathTrace {
    let model = config.model.clone().without_noise();
    let params = {
        let mut draw = config.sampler.mean_draw();
        draw.fusion_year = fusion_year;
        draw
    };
    // Noise-free, but each step still consumes its shocks and collapse uniform.
    let mut rng = RngHierarchy::new(config.seed).rng_for(TRACE_STREAM, 0);
    let trace = trace_path(&params, &model, &mut rng);
    debug!(
        fusion_year,
        steps = trace.steps.len(),
        collapsed = trace.outcome.collapsed,
        "traced representative path"
    );
    trace
}

/// One representative path traced under each of several fusion years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceComparison {
    pub fusion_years: Vec<f64>,
    /// `traces[i]` was run with `fusion_years[i]`.
    pub traces: Vec<PathTrace>,
}

impl TraceComparison {
    /// Calendar years covered by the longest trace.
    pub fn years(&self) -> Vec<i32> {
        self.traces
            .iter()
            .max_by_key(|t| t.steps.len())
            .map(|t| t.steps.iter().map(|s| s.year).collect())
            .unwrap_or_default()
    }

    /// State of every trace in `year`. A trace that stopped early at a
    /// collapse reports its last state.
    pub fn states_in(&self, year: i32) -> Vec<Option<StateVector>> {
        self.traces
            .iter()
            .map(|t| {
                t.steps
                    .iter()
                    .take_while(|s| s.year <= year)
                    .last()
                    .map(|s| s.state)
            })
            .collect()
    }
}

pub fn trace_comparison(config: &ExperimentConfig, fusion_years: &[f64]) -> TraceComparison {
    TraceComparison {
        fusion_years: fusion_years.to_vec(),
        traces: fusion_years
            .iter()
            .map(|&fy| trace_representative(config, fy))
            .collect(),
    }
}
