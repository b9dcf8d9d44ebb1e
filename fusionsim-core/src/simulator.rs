//! Annual state transition for one path.
//!
//! Seven sub-steps per year, each reading only values produced earlier in the
//! same year:
//!
//! 1. temperature (forcing × output × sensitivity ÷ energy, mitigated over time)
//! 2. damages (power law of temperature)
//! 3. energy (fusion adoption or pre-fusion decay + clean energy)
//! 4. institutional stability (damages, scarcity, output velocity)
//! 5. conflict collapse draw (only acted on while stability is below brittleness)
//! 6. output (investment − damages − maintenance, threshold collapse)
//! 7. output floor at zero
//!
//! Every step pulls exactly three values from the caller's stream, in this
//! order: temperature shock, energy shock, collapse uniform. The energy shock
//! is discarded once fusion has arrived and the uniform whenever no conflict
//! draw is due, so two paths sharing a stream see the same shocks in every
//! year whatever their fusion year or stability.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::config::{ModelConfig, NoiseOrder, VelocityMode};
use crate::domain::{CollapseCause, ParameterDraw, PathState, StepFlows, StepOutcome};

/// Logistic fusion adoption share in `year`.
///
/// The curve is centred `ln(999)/k` years after `fusion_year`, so adoption
/// starts at 0.1% when fusion arrives and crosses 50% at the midpoint.
pub fn adoption_share(year: f64, fusion_year: f64, steepness: f64) -> f64 {
    let midpoint = fusion_year + 999f64.ln() / steepness;
    1.0 / (1.0 + (-steepness * (year - midpoint)).exp())
}

/// Advances a [`PathState`] one year under fixed latent parameters.
#[derive(Debug, Clone, Copy)]
pub struct PathSimulator<'a> {
    config: &'a ModelConfig,
    params: &'a ParameterDraw,
}

impl<'a> PathSimulator<'a> {
    pub fn new(config: &'a ModelConfig, params: &'a ParameterDraw) -> Self {
        Self { config, params }
    }

    pub fn config(&self) -> &ModelConfig {
        self.config
    }

    pub fn params(&self) -> &ParameterDraw {
        self.params
    }

    /// Advance `state` in place by the step at `step_index` (0 = start year).
    ///
    /// `state.collapsed` is sticky: once set, output stays at the collapse
    /// floor and the output update is skipped on every later call.
    pub fn step<R: Rng + ?Sized>(
        &self,
        state: &mut PathState,
        step_index: usize,
        rng: &mut R,
    ) -> StepOutcome {
        let cfg = self.config;
        let p = self.params;
        let year = f64::from(cfg.year_at(step_index));
        let elapsed = step_index as f64;
        let output_at_start = state.vector.output;
        let mut flows = StepFlows::default();
        let mut collapse = None;

        // 1. Temperature
        let v = &mut state.vector;
        let forcing = cfg.forcing_coeff
            * (1.0 - cfg.mitigation_rate * elapsed)
            * (v.output / cfg.output_reference)
            * (p.climate_sensitivity / cfg.sensitivity_reference)
            * (cfg.energy_reference / v.energy);
        let shock = cfg.temperature_noise_sd * rng.sample::<f64, _>(StandardNormal);
        let energy_shock: f64 = rng.sample(StandardNormal);
        let conflict_draw: f64 = rng.gen();
        match cfg.noise_order {
            NoiseOrder::ShockThenFloor => v.temperature += (forcing + shock).max(0.0),
            NoiseOrder::FloorThenShock => {
                v.temperature = (v.temperature + forcing.max(0.0) + shock).max(0.0)
            }
        }

        // 2. Damages
        let damages = v.output * cfg.damage_coeff * v.temperature.powf(cfg.damage_exponent);
        flows.damages = damages;

        // 3. Energy
        let effective_fusion_year = p.fusion_year + state.fusion_delay;
        flows.effective_fusion_year = effective_fusion_year;
        if year >= effective_fusion_year {
            let share = adoption_share(year, effective_fusion_year, cfg.adoption_steepness);
            flows.fusion_share = share;
            v.energy = (v.energy + cfg.fusion_build_rate * v.stability * share)
                .clamp(cfg.energy_floor, cfg.energy_cap);
        } else {
            if let Some(delay) = cfg.delay_feedback {
                let initial_output = cfg.initial_state.output;
                state.fusion_delay += delay.stability_weight * (1.0 - v.stability).max(0.0)
                    + delay.output_weight * (1.0 - v.output / initial_output).max(0.0);
            }
            let clean = cfg.clean_ceiling
                / (1.0 + (-cfg.clean_steepness * (year - cfg.clean_midpoint_year)).exp())
                * v.stability;
            let noise = cfg.energy_noise_sd * energy_shock;
            v.energy = (v.energy - cfg.eroi_decay - cfg.warming_drag * v.temperature
                + clean
                + noise)
                .clamp(cfg.energy_floor, cfg.energy_cap);
        }

        // 4. Institutional stability
        let reference_output = match cfg.velocity_mode {
            VelocityMode::WithinStep => output_at_start,
            VelocityMode::Lagged => state.previous_output,
        };
        let velocity =
            (reference_output - v.output).max(0.0) / (v.output + cfg.velocity_buffer);
        flows.velocity = velocity;
        let loss = damages / (v.output + cfg.damage_buffer)
            + cfg.scarcity_coeff / v.energy
            + cfg.velocity_coeff * velocity;
        v.stability = (v.stability - cfg.institutional_coeff * loss + cfg.recovery_drift)
            .clamp(0.0, cfg.stability_max);

        // 5. Conflict collapse
        if !state.collapsed && v.stability < p.conflict_brittleness {
            let risk =
                cfg.collapse_base_risk + cfg.collapse_risk_slope * (p.conflict_brittleness - v.stability);
            if conflict_draw < risk {
                v.output = cfg.collapse_floor;
                state.collapsed = true;
                collapse = Some(CollapseCause::Conflict);
            }
        }

        // 6. Output
        if !state.collapsed {
            let dampener = 1.0 / (1.0 + (v.output / cfg.gdp_ceiling).powi(2));
            let investment = v.output
                * p.base_growth
                * v.stability
                * (v.energy / cfg.energy_reference)
                * dampener;
            let efficiency = (1.0 - v.energy / cfg.efficiency_scale).max(cfg.efficiency_floor);
            let maintenance = v.output
                * cfg.maintenance_rate
                * (v.temperature / cfg.temperature_reference)
                * efficiency;
            v.output += investment - damages - maintenance;
            flows.growth_dampener = dampener;
            flows.investment = investment;
            flows.maintenance = maintenance;

            if v.output < cfg.collapse_threshold {
                v.output = cfg.collapse_floor;
                state.collapsed = true;
                collapse = Some(CollapseCause::OutputThreshold);
            }
        }

        // 7. Floor
        v.output = v.output.max(0.0);
        state.previous_output = output_at_start;

        StepOutcome { flows, collapse }
    }
}
