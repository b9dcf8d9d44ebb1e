//! BDD tests for interventions and the analyses built on them.
//!
//! These tests verify:
//! - Earlier fusion never lowers expected terminal output
//! - The frontier is non-increasing in fusion year
//! - Latent correlations point the expected way
//! - Outcome histograms account for every path
//! - Discounting properties and the break-even "not found" path
//! - Robustness and social return runs end to end
//! - Artifacts land on disk

use fusionsim_runner::{
    break_even_rate, export, frontier, histogram, latent_correlations, outcome_histograms,
    present_value, run_intervention_grid, run_robustness, run_social_return, run_summary,
    run_trajectories, standard_calibrations, BreakEvenSearch, DiscountError, ExperimentConfig,
    FrontierConfig, Histogram, LatentParameter, SocialReturnConfig, SummaryStatistic,
};

fn experiment(n_paths: usize, seed: u64) -> ExperimentConfig {
    ExperimentConfig::default().with_paths(n_paths).with_seed(seed)
}

#[test]
fn bdd_scenario_earlier_fusion_raises_terminal_output() {
    // GIVEN a widely spaced fusion-year grid with common random numbers
    let cfg = experiment(400, 42);
    let grid = [2030.0, 2045.0, 2060.0];

    // WHEN the intervention grid runs
    let result = run_intervention_grid(&grid, &cfg).expect("grid should run");

    // THEN mean terminal output falls as fusion arrives later
    let gradients = result.gradients(SummaryStatistic::MeanTerminal);
    assert_eq!(gradients.len(), 2);
    assert_eq!(gradients[0].midpoint, 2037.5);
    for g in &gradients {
        let value = g.gradient.expect("mean is defined");
        assert!(value <= 0.0, "gradient at {} is {}", g.midpoint, value);
    }

    // AND every grid point used the same path count
    assert!(result.points.iter().all(|p| p.summary.n_paths == 400));
}

#[test]
fn bdd_scenario_frontier_is_monotone() {
    // GIVEN a trajectory ensemble over the default fusion-year distribution
    let cfg = experiment(600, 7);
    let run = run_trajectories(&cfg).unwrap();
    let summary = run.summary(&cfg.model);

    // WHEN the frontier is computed
    let points = frontier(&run.matrix, &summary.fusion_years, &FrontierConfig::default());

    // THEN it has one point per level, ordered by fusion year
    assert_eq!(points.len(), 49);
    assert!(points.windows(2).all(|w| w[0].x <= w[1].x));

    // AND it never rises with fusion year
    assert!(points.windows(2).all(|w| w[0].y >= w[1].y));
}

#[test]
fn bdd_scenario_fusion_year_correlates_negatively_with_terminal_output() {
    // GIVEN a summary ensemble
    let summary = run_summary(&experiment(800, 3)).unwrap();

    // WHEN latent correlations are computed
    let correlations = latent_correlations(&summary);

    // THEN fusion year is negatively correlated with terminal output
    let fy = correlations
        .iter()
        .find(|c| c.parameter == LatentParameter::FusionYear)
        .unwrap();
    assert!(fy.rho.unwrap() < 0.0);

    // AND the results are sorted strongest-negative first
    let rhos: Vec<f64> = correlations.iter().filter_map(|c| c.rho).collect();
    assert!(rhos.windows(2).all(|w| w[0] <= w[1]));

    // AND a terminal histogram covers every path
    let h = histogram(&summary.terminal_values, 30).unwrap();
    assert_eq!(h.counts.iter().sum::<usize>(), 800);

    // AND the outcome histograms count every path with a defined value
    let outcomes = outcome_histograms(&summary);
    let total = |h: Option<&Histogram>| h.map_or(0, |h| h.counts.iter().sum::<usize>());
    assert_eq!(total(outcomes.nadir_value.as_ref()), 800);
    assert_eq!(total(outcomes.nadir_year.as_ref()), 800);
    assert_eq!(total(outcomes.terminal_value.as_ref()), 800);
    assert_eq!(
        total(outcomes.recovery_duration.as_ref()),
        summary.recovery_durations.len()
    );
}

#[test]
fn bdd_scenario_present_value_properties() {
    // GIVEN a single increment at the base year
    // THEN its PV equals the increment at any rate
    assert_eq!(present_value(&[4.0], &[2026], 2026, 0.3).unwrap(), 4.0);

    // GIVEN a constant positive stream
    let years: Vec<i32> = (2026..2101).collect();
    let stream = vec![2.0; years.len()];

    // THEN PV strictly decreases with the rate
    let low = present_value(&stream, &years, 2026, 0.014).unwrap();
    let high = present_value(&stream, &years, 2026, 0.05).unwrap();
    assert!(low > high);

    // AND the break-even rate reproduces the cost
    let cost = 10.0;
    let r = break_even_rate(&stream, &years, 2026, cost, &BreakEvenSearch::default()).unwrap();
    let pv = present_value(&stream, &years, 2026, r).unwrap();
    assert!((pv - cost).abs() < 1e-6);
}

#[test]
fn bdd_scenario_break_even_not_found() {
    // GIVEN a stream worth less than the cost even at the lowest rate
    let years: Vec<i32> = (2026..2036).collect();
    let stream = vec![0.001; years.len()];

    // WHEN the break-even search runs
    let result = break_even_rate(&stream, &years, 2026, 1.0, &BreakEvenSearch::default());

    // THEN it reports no sign change instead of a number
    assert!(matches!(result, Err(DiscountError::NoSignChange { .. })));
}

#[test]
fn bdd_scenario_robustness_table() {
    // GIVEN the standard calibration list and a small ensemble
    let base = experiment(60, 42);
    let calibrations = standard_calibrations();

    // WHEN robustness runs
    let rows = run_robustness(&base, &calibrations).unwrap();

    // THEN there is one row per calibration, in order
    assert_eq!(rows.len(), calibrations.len());
    for (row, cal) in rows.iter().zip(&calibrations) {
        assert_eq!(row.label, cal.label);
        assert!((0.0..=100.0).contains(&row.abundance_pct));
    }

    // AND the table exports as CSV
    let csv = export::export_robustness_csv(&rows).unwrap();
    assert_eq!(csv.lines().count(), rows.len() + 1);
}

#[test]
fn bdd_scenario_social_return_report_and_artifacts() {
    // GIVEN a reduced grid containing the acceleration window
    let exp = experiment(80, 123);
    let cfg = SocialReturnConfig {
        grid: vec![2030.0, 2040.0, 2050.0],
        ..SocialReturnConfig::default()
    };

    // WHEN the social return analysis runs
    let report = run_social_return(&exp, &cfg).unwrap();

    // THEN adjacent intervals and the window are reported
    assert_eq!(report.intervals.len(), 2);
    assert_eq!(report.window.early, 2040.0);
    assert_eq!(report.window.late, 2050.0);
    assert_eq!(report.discount_table.len(), cfg.rates.len());

    // AND a found break-even rate lies inside the bracket
    if let Some(r) = report.break_even_rate {
        assert!((cfg.search.lo..=cfg.search.hi).contains(&r));
    }

    // AND artifacts can be written to disk
    let dir = tempfile::tempdir().unwrap();
    let json = export::export_json(&report).unwrap();
    let path = export::write_artifact(dir.path(), "roi.json", &json).unwrap();
    let back: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(back["base_year"], 2026);
    let csv = export::export_discount_csv(&report).unwrap();
    assert!(csv.starts_with("rate,label,present_value,ratio_to_cost"));
}
