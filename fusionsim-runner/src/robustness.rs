//! Calibration sensitivity: re-run the ensemble with one knob moved at a
//! time and tabulate the headline outcome rates.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ExperimentConfig;
use crate::ensemble::{run_summary, EnsembleSummary, RunError};

/// A single knob moved away from the base calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "knob", content = "value", rename_all = "snake_case")]
pub enum CalibrationOverride {
    DamageExponent(f64),
    EroiDecay(f64),
    InstitutionalCoeff(f64),
    GdpCeiling(f64),
    FusionMean(f64),
}

impl CalibrationOverride {
    pub fn apply(&self, config: &mut ExperimentConfig) {
        match *self {
            CalibrationOverride::DamageExponent(v) => config.model.damage_exponent = v,
            CalibrationOverride::EroiDecay(v) => config.model.eroi_decay = v,
            CalibrationOverride::InstitutionalCoeff(v) => config.model.institutional_coeff = v,
            CalibrationOverride::GdpCeiling(v) => config.model.gdp_ceiling = v,
            CalibrationOverride::FusionMean(v) => config.sampler.fusion_mu = v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub label: String,
    pub overrides: Vec<CalibrationOverride>,
}

impl Calibration {
    pub fn new(label: impl Into<String>, overrides: Vec<CalibrationOverride>) -> Self {
        Self {
            label: label.into(),
            overrides,
        }
    }

    pub fn apply_to(&self, base: &ExperimentConfig) -> ExperimentConfig {
        let mut config = base.clone();
        for o in &self.overrides {
            o.apply(&mut config);
        }
        config
    }
}

/// Baseline plus each knob at a low and a high alternative.
pub fn standard_calibrations() -> Vec<Calibration> {
    use CalibrationOverride::*;
    vec![
        Calibration::new("Baseline", vec![]),
        Calibration::new("Damage exp = 2.0", vec![DamageExponent(2.0)]),
        Calibration::new("Damage exp = 3.2", vec![DamageExponent(3.2)]),
        Calibration::new("EROI decay = 0.06", vec![EroiDecay(0.06)]),
        Calibration::new("EROI decay = 0.18", vec![EroiDecay(0.18)]),
        Calibration::new("Inst. coeff = 0.020", vec![InstitutionalCoeff(0.020)]),
        Calibration::new("Inst. coeff = 0.050", vec![InstitutionalCoeff(0.050)]),
        Calibration::new("GDP ceiling = 1000T", vec![GdpCeiling(1000.0)]),
        Calibration::new("GDP ceiling = 4000T", vec![GdpCeiling(4000.0)]),
        Calibration::new("Fusion mu = 2028", vec![FusionMean(2028.0)]),
        Calibration::new("Fusion mu = 2045", vec![FusionMean(2045.0)]),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessRow {
    pub label: String,
    pub abundance_pct: f64,
    pub never_recovered_pct: f64,
    pub collapse_pct: f64,
    pub median_terminal: Option<f64>,
    pub mean_terminal: Option<f64>,
    pub no_downturn_pct: f64,
}

impl RobustnessRow {
    fn from_summary(label: &str, s: &EnsembleSummary) -> Self {
        Self {
            label: label.to_string(),
            abundance_pct: s.abundance_pct,
            never_recovered_pct: s.never_recovered_pct,
            collapse_pct: s.collapse_pct,
            median_terminal: s.median_terminal,
            mean_terminal: s.mean_terminal,
            no_downturn_pct: s.no_downturn_pct,
        }
    }
}

pub fn run_robustness(
    base: &ExperimentConfig,
    calibrations: &[Calibration],
) -> Result<Vec<RobustnessRow>, RunError> {
    info!(calibrations = calibrations.len(), n_paths = base.n_paths, "running robustness analysis");
    calibrations
        .iter()
        .map(|cal| {
            let summary = run_summary(&cal.apply_to(base))?;
            let row = RobustnessRow::from_summary(&cal.label, &summary);
            info!(
                calibration = %cal.label,
                abundance_pct = row.abundance_pct,
                never_recovered_pct = row.never_recovered_pct,
                median_terminal = row.median_terminal,
                "calibration done"
            );
            Ok(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_list_starts_with_baseline() {
        let cals = standard_calibrations();
        assert_eq!(cals.len(), 11);
        assert_eq!(cals[0].label, "Baseline");
        assert!(cals[0].overrides.is_empty());
        assert!(cals[1..].iter().all(|c| c.overrides.len() == 1));
    }

    #[test]
    fn overrides_touch_one_knob() {
        let base = ExperimentConfig::default();
        let cfg = Calibration::new("x", vec![CalibrationOverride::GdpCeiling(1000.0)]).apply_to(&base);
        assert_eq!(cfg.model.gdp_ceiling, 1000.0);
        assert_eq!(cfg.model.damage_exponent, base.model.damage_exponent);
        assert_eq!(cfg.sampler, base.sampler);

        let cfg = Calibration::new("y", vec![CalibrationOverride::FusionMean(2045.0)]).apply_to(&base);
        assert_eq!(cfg.sampler.fusion_mu, 2045.0);
        assert_eq!(cfg.model, base.model);
    }

    #[test]
    fn baseline_row_matches_plain_run() {
        let base = ExperimentConfig::default().with_paths(40);
        let rows = run_robustness(&base, &standard_calibrations()[..1]).unwrap();
        let plain = run_summary(&base).unwrap();
        assert_eq!(rows[0].abundance_pct, plain.abundance_pct);
        assert_eq!(rows[0].median_terminal, plain.median_terminal);
    }

    #[test]
    fn override_round_trips_through_json() {
        let o = CalibrationOverride::EroiDecay(0.18);
        let json = serde_json::to_string(&o).unwrap();
        assert_eq!(json, r#"{"knob":"eroi_decay","value":0.18}"#);
        let back: CalibrationOverride = serde_json::from_str(&json).unwrap();
        assert_eq!(back, o);
    }
}
