//! Concrete single-path scenarios.

use fusionsim_core::{
    run_path, trace_path, CollapseCause, ModelConfig, ParameterSampler, RngHierarchy,
    SamplerConfig,
};

#[test]
fn immediate_fusion_never_enters_pre_fusion_branch() {
    // GIVEN a zero-variance sampler pinned to fusion in the first simulated year
    let cfg = ModelConfig::default();
    let sampler_cfg = SamplerConfig {
        fusion_mu: 2026.0,
        ..SamplerConfig::default()
    }
    .degenerate();
    let sampler = ParameterSampler::new(&sampler_cfg).unwrap();
    let mut rng = RngHierarchy::new(42).rng_for("scenario", 0);
    let params = sampler.sample(&mut rng);
    assert_eq!(params.fusion_year, 2026.0);

    // WHEN a single path is traced
    let trace = trace_path(&params, &cfg, &mut rng);

    // THEN every computed year is post-fusion and energy never falls
    let mut last = cfg.initial_state.energy;
    for step in &trace.steps {
        assert!(step.flows.fusion_share > 0.0, "pre-fusion branch in {}", step.year);
        assert!(step.state.energy >= last);
        assert!(step.state.energy <= 100.0);
        last = step.state.energy;
    }
}

#[test]
fn unreachable_brittleness_isolates_output_threshold_trigger() {
    // GIVEN brittleness no stability value can fall below (stability is clamped at 0)
    let cfg = ModelConfig::default();
    let sampler = ParameterSampler::new(&SamplerConfig::default().with_brittleness(0.0)).unwrap();
    let hierarchy = RngHierarchy::new(7);

    // WHEN many paths run, including harsh calibrations that do collapse
    let mut harsh = cfg.clone();
    harsh.damage_exponent = 3.4;
    harsh.eroi_decay = 0.3;
    for i in 0..300 {
        let mut rng = hierarchy.rng_for("brittleness", i);
        let params = sampler.sample(&mut rng);
        let r = run_path(&params, &harsh, &mut rng);
        // THEN any collapse comes from the output threshold only
        if let Some(cause) = r.outcome.collapse_cause {
            assert_eq!(cause, CollapseCause::OutputThreshold);
        }
    }
}

#[test]
fn brittleness_at_stability_cap_keeps_conflict_risk_live() {
    // Brittleness 1.2 sits above the initial stability of 1.0, so the
    // conflict draw is active from the first year.
    let cfg = ModelConfig::default();
    let sampler = ParameterSampler::new(&SamplerConfig::default().with_brittleness(1.2)).unwrap();
    let hierarchy = RngHierarchy::new(9);
    let conflicts = (0..50)
        .filter(|&i| {
            let mut rng = hierarchy.rng_for("cap", i);
            let params = sampler.sample(&mut rng);
            run_path(&params, &cfg, &mut rng).outcome.collapse_cause == Some(CollapseCause::Conflict)
        })
        .count();
    assert!(conflicts > 0);
}

#[test]
fn same_stream_reproduces_path_exactly() {
    let cfg = ModelConfig::default();
    let sampler = ParameterSampler::new(&SamplerConfig::default()).unwrap();
    let hierarchy = RngHierarchy::new(2024);

    let run = || {
        let mut rng = hierarchy.rng_for("repro", 17);
        let params = sampler.sample(&mut rng);
        run_path(&params, &cfg, &mut rng)
    };
    assert_eq!(run(), run());
}

#[test]
fn delay_feedback_pushes_effective_fusion_year_later() {
    let mut cfg = ModelConfig::default();
    cfg.delay_feedback = Some(Default::default());
    let sampler = ParameterSampler::new(&SamplerConfig::default().pinned(2050.0)).unwrap();
    let hierarchy = RngHierarchy::new(3);
    let mut rng = hierarchy.rng_for("delay", 0);
    let params = sampler.sample(&mut rng);
    let r = run_path(&params, &cfg, &mut rng);
    assert!(r.outcome.effective_fusion_year >= params.fusion_year);
}

#[test]
fn delay_feedback_accumulates_exactly_from_a_fragile_start() {
    // GIVEN stability at half its calm level and delay feedback switched on
    let mut cfg = ModelConfig::default().without_noise();
    cfg.initial_state.stability = 0.5;
    cfg.delay_feedback = Some(Default::default());
    let sampler = ParameterSampler::new(&SamplerConfig::default().pinned(2050.0)).unwrap();
    let mut rng = RngHierarchy::new(3).rng_for("fragile", 0);
    let params = sampler.sample(&mut rng);

    // WHEN the path is traced
    let trace = trace_path(&params, &cfg, &mut rng);

    // THEN the first pre-fusion year adds 0.5·(1 − I) + 0.5·max(0, 1 − Y/Y0)
    let y0 = cfg.initial_state.output;
    let expected = 0.5 * (1.0 - 0.5) + 0.5 * (1.0 - y0 / y0).max(0.0);
    assert_eq!(trace.steps[0].flows.effective_fusion_year, params.fusion_year);
    assert_eq!(
        trace.steps[1].flows.effective_fusion_year,
        params.fusion_year + expected
    );

    // AND the arrival year ends strictly later than drawn
    assert!(trace.outcome.effective_fusion_year > params.fusion_year);
}
