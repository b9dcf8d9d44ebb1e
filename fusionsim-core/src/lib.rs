//! FusionSim Core — the coupled climate / energy / output / institutions model.
//!
//! This crate contains the per-path machinery:
//! - Model configuration with every recurrence constant in one place
//! - Domain types (state vector, latent draw, per-step flows)
//! - Deterministic RNG hierarchy for reproducible, parallel-safe streams
//! - Latent parameter sampler with `do(fusion_year)` interventions
//! - Annual state transition (path simulator)
//! - Path runner with collapse absorption, forward-fill and event bookkeeping

pub mod config;
pub mod domain;
pub mod path;
pub mod rng;
pub mod sampler;
pub mod simulator;

pub use config::{ConfigError, DelayFeedback, ModelConfig, NoiseOrder, VelocityMode};
pub use domain::{CollapseCause, ParameterDraw, PathState, StateVector, StepFlows, StepOutcome};
pub use path::{run_path, run_path_outcome, trace_path, PathOutcome, PathResult, PathTrace, TraceStep};
pub use rng::RngHierarchy;
pub use sampler::{ParameterSampler, SamplerConfig, SamplerError, PIN_SIGMA};
pub use simulator::{adoption_share, PathSimulator};
