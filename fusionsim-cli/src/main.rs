//! FusionSim CLI — Monte Carlo runs, fusion-timing interventions and reports.
//!
//! Commands:
//! - `simulate` — ensemble over the sampled fusion year, outcome rates and bands
//! - `intervene` — `do(fusion_year)` grid with finite-difference gradients
//! - `robustness` — outcome rates under alternative calibrations
//! - `roi` — cumulative gain from acceleration, discount table, break-even rate
//! - `trace` — deterministic representative path, compared across fusion years
//! - `config` — print the default experiment configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use fusionsim_core::PathTrace;
use fusionsim_runner::{
    export, frontier, latent_correlations, outcome_histograms, percentile_bands,
    run_intervention_grid, run_robustness, run_social_return, run_trajectories,
    standard_calibrations, trace_comparison, ExperimentConfig, FrontierConfig,
    SocialReturnConfig, SummaryStatistic, TraceComparison, CANONICAL_GRID, DEFAULT_BAND_LEVELS,
};

#[derive(Parser)]
#[command(
    name = "fusionsim",
    about = "FusionSim — Monte Carlo climate/energy/output model with fusion-timing interventions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Experiment TOML file. Defaults are used for anything it omits.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of Monte Carlo paths (overrides the config file).
    #[arg(long)]
    paths: Option<usize>,

    /// Master seed (overrides the config file).
    #[arg(long)]
    seed: Option<u64>,

    /// Run paths on a single thread.
    #[arg(long, default_value_t = false)]
    serial: bool,

    /// Directory for CSV/JSON artifacts.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StatArg {
    MeanTerminal,
    MedianTerminal,
    Abundance,
    Collapse,
    NoDownturn,
    NeverRecovered,
}

impl From<StatArg> for SummaryStatistic {
    fn from(arg: StatArg) -> Self {
        match arg {
            StatArg::MeanTerminal => SummaryStatistic::MeanTerminal,
            StatArg::MedianTerminal => SummaryStatistic::MedianTerminal,
            StatArg::Abundance => SummaryStatistic::AbundancePct,
            StatArg::Collapse => SummaryStatistic::CollapsePct,
            StatArg::NoDownturn => SummaryStatistic::NoDownturnPct,
            StatArg::NeverRecovered => SummaryStatistic::NeverRecoveredPct,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the baseline ensemble and print outcome rates.
    Simulate {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Pin the fusion year across a grid and report causal gradients.
    Intervene {
        #[command(flatten)]
        run: RunArgs,

        /// Comma-separated fusion years. Defaults to 2030..=2060 step 5.
        #[arg(long, value_delimiter = ',')]
        grid: Option<Vec<f64>>,

        /// Statistic to differentiate.
        #[arg(long, value_enum, default_value_t = StatArg::MeanTerminal)]
        stat: StatArg,
    },
    /// Re-run the ensemble under alternative calibrations.
    Robustness {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Social return on one year of fusion acceleration.
    Roi {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Noise-free trace of one path with latent parameters at their means.
    Trace {
        #[command(flatten)]
        run: RunArgs,

        /// Comma-separated fusion years. One year prints its full flows,
        /// several print output, energy and stability side by side.
        #[arg(long, value_delimiter = ',', default_values_t = [2030.0, 2040.0, 2050.0])]
        fusion_years: Vec<f64>,

        /// Print every n-th year.
        #[arg(long, default_value_t = 5)]
        every: usize,
    },
    /// Print the default experiment configuration as TOML.
    Config,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { run } => run_simulate(&run),
        Commands::Intervene { run, grid, stat } => {
            let grid = grid.unwrap_or_else(|| CANONICAL_GRID.to_vec());
            run_intervene(&run, &grid, stat.into())
        }
        Commands::Robustness { run } => run_robustness_cmd(&run),
        Commands::Roi { run } => run_roi(&run),
        Commands::Trace {
            run,
            fusion_years,
            every,
        } => run_trace(&run, &fusion_years, every),
        Commands::Config => {
            let text = ExperimentConfig::default()
                .to_toml()
                .context("failed to render default configuration")?;
            print!("{text}");
            Ok(())
        }
    }
}

fn load_experiment(args: &RunArgs) -> Result<ExperimentConfig> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    if let Some(n) = args.paths {
        config.n_paths = n;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.serial {
        config.parallel = false;
    }
    config.validate().context("invalid experiment configuration")?;
    Ok(config)
}

fn save(out_dir: Option<&Path>, name: &str, contents: &str) -> Result<()> {
    if let Some(dir) = out_dir {
        let path = export::write_artifact(dir, name, contents)?;
        info!(path = %path.display(), "artifact written");
    }
    Ok(())
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "n/a".to_string(),
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_simulate(args: &RunArgs) -> Result<()> {
    let config = load_experiment(args)?;
    let run = run_trajectories(&config)?;
    let summary = run.summary(&config.model);

    println!("=== Ensemble: {} paths, seed {} ===", summary.n_paths, config.seed);
    println!("No downturn:          {:>6.1}%", summary.no_downturn_pct);
    println!("Median nadir year:    {:>6}", fmt_opt(summary.median_nadir_year, 0));
    println!(
        "Median recovery:      {:>6} years",
        fmt_opt(summary.median_recovery_years, 1)
    );
    println!("Never recovered:      {:>6.1}%", summary.never_recovered_pct);
    println!("Abundance (>{}T):    {:>6.1}%", config.model.abundance_threshold, summary.abundance_pct);
    println!("Collapse:             {:>6.1}%", summary.collapse_pct);
    println!(
        "Terminal output:      median {}T, mean {}T",
        fmt_opt(summary.median_terminal, 0),
        fmt_opt(summary.mean_terminal, 0)
    );

    println!();
    println!("{:<24} {:>10}", "Latent parameter", "Spearman ρ");
    println!("{}", "-".repeat(35));
    for c in latent_correlations(&summary) {
        println!("{:<24} {:>10}", c.parameter.label(), fmt_opt(c.rho, 3));
    }

    let bands = percentile_bands(&run.matrix, &DEFAULT_BAND_LEVELS);
    println!();
    print!("{:<6}", "Year");
    for level in &bands.levels {
        print!(" {:>9}", format!("p{level}"));
    }
    println!();
    for (i, year) in bands.years.iter().enumerate() {
        if (year - bands.years[0]) % 10 != 0 && i + 1 != bands.years.len() {
            continue;
        }
        print!("{year:<6}");
        for row in &bands.values {
            print!(" {:>9.1}", row[i]);
        }
        println!();
    }

    let out_dir = args.out_dir.as_deref();
    save(out_dir, "summary.json", &export::export_json(&summary)?)?;
    save(out_dir, "bands.csv", &export::export_bands_csv(&bands)?)?;
    let points = frontier(&run.matrix, &summary.fusion_years, &FrontierConfig::default());
    save(out_dir, "frontier.csv", &export::export_frontier_csv(&points)?)?;

    println!();
    let histograms = outcome_histograms(&summary);
    for (name, h) in histograms.named() {
        let Some(h) = h else {
            println!("{name:<18} no data");
            continue;
        };
        let (mode, _) = h
            .counts
            .iter()
            .enumerate()
            .fold((0, 0), |best, (i, &c)| if c > best.1 { (i, c) } else { best });
        println!(
            "{name:<18} {:>3} bins over [{:.1}, {:.1}], mode bin [{:.1}, {:.1})",
            h.counts.len(),
            h.edges[0],
            h.edges[h.counts.len()],
            h.edges[mode],
            h.edges[mode + 1]
        );
        save(out_dir, &format!("hist_{name}.csv"), &export::export_histogram_csv(h)?)?;
    }
    Ok(())
}

fn run_intervene(args: &RunArgs, grid: &[f64], stat: SummaryStatistic) -> Result<()> {
    let config = load_experiment(args)?;
    let result = run_intervention_grid(grid, &config)?;

    println!("=== do(fusion_year) grid: {} paths per point ===", config.n_paths);
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Fusion", "Mean", "Median", "Abund.%", "Collapse%", "NoDown%"
    );
    println!("{}", "-".repeat(63));
    for p in &result.points {
        let s = &p.summary;
        println!(
            "{:<8} {:>10} {:>10} {:>10.1} {:>10.1} {:>10.1}",
            p.value,
            fmt_opt(s.mean_terminal, 0),
            fmt_opt(s.median_terminal, 0),
            s.abundance_pct,
            s.collapse_pct,
            s.no_downturn_pct
        );
    }

    println!();
    println!("Gradient of {} per year of delay:", stat.label());
    for g in result.gradients(stat) {
        println!("  {:>7.1}  {:>12}", g.midpoint, fmt_opt(g.gradient, 2));
    }

    let out_dir = args.out_dir.as_deref();
    save(out_dir, "intervention.csv", &export::export_intervention_csv(&result)?)?;
    save(
        out_dir,
        "gradients.csv",
        &export::export_gradients_csv(&result, &SummaryStatistic::ALL)?,
    )?;
    Ok(())
}

fn run_robustness_cmd(args: &RunArgs) -> Result<()> {
    let config = load_experiment(args)?;
    let rows = run_robustness(&config, &standard_calibrations())?;

    println!(
        "{:<22} {:>9} {:>11} {:>9} {:>10} {:>9}",
        "Calibration", "Abund.%", "NeverRec.%", "Collapse%", "Median", "NoDown%"
    );
    println!("{}", "-".repeat(75));
    for r in &rows {
        println!(
            "{:<22} {:>9.1} {:>11.1} {:>9.1} {:>10} {:>9.1}",
            r.label,
            r.abundance_pct,
            r.never_recovered_pct,
            r.collapse_pct,
            fmt_opt(r.median_terminal, 0),
            r.no_downturn_pct
        );
    }

    save(args.out_dir.as_deref(), "robustness.csv", &export::export_robustness_csv(&rows)?)?;
    Ok(())
}

fn run_roi(args: &RunArgs) -> Result<()> {
    let config = load_experiment(args)?;
    let roi = SocialReturnConfig::default();
    let report = run_social_return(&config, &roi)?;

    for m in &report.mean_trajectories {
        println!(
            "do(fusion={}): terminal {:.0}T, cumulative {:.0} T·yr",
            m.fusion_year, m.terminal, m.cumulative
        );
    }

    println!();
    println!(
        "{:<12} {:>14} {:>18} {:>16}",
        "Interval", "Terminal Δ (T)", "Cumulative Δ (T·yr)", "Per year"
    );
    println!("{}", "-".repeat(63));
    for g in &report.intervals {
        println!(
            "{:<12} {:>14.0} {:>18.0} {:>16.0}",
            format!("{}-{}", g.early, g.late),
            g.terminal_gain,
            g.cumulative_gain,
            g.gain_per_year
        );
    }

    println!();
    println!(
        "Window {}-{}: {:.0} T·yr per year of acceleration (×{} terminal-only)",
        report.window.early,
        report.window.late,
        report.window.gain_per_year,
        fmt_opt(report.cumulative_to_terminal_ratio(), 0)
    );
    println!("Reference cost: ${:.0}B", report.reference_cost * 1000.0);
    println!();
    println!("{:<8} {:>12} {:>14}  {}", "Rate", "PV (T)", "× cost", "Framework");
    println!("{}", "-".repeat(55));
    for row in &report.discount_table {
        println!(
            "{:>6.1}% {:>12.1} {:>14.0}  {}",
            row.rate * 100.0,
            row.present_value,
            row.ratio_to_cost,
            row.label
        );
    }
    match report.break_even_rate {
        Some(r) => println!("\nBreak-even discount rate: {:.1}%", r * 100.0),
        None => println!("\nBreak-even discount rate: not found in search bracket"),
    }

    let out_dir = args.out_dir.as_deref();
    save(out_dir, "roi.json", &export::export_json(&report)?)?;
    save(out_dir, "discount.csv", &export::export_discount_csv(&report)?)?;
    Ok(())
}

fn run_trace(args: &RunArgs, fusion_years: &[f64], every: usize) -> Result<()> {
    let config = load_experiment(args)?;
    let comparison = trace_comparison(&config, fusion_years);
    let every = every.max(1);

    match comparison.traces.as_slice() {
        [] => println!("No fusion years given."),
        [trace] => print_trace_flows(trace, every),
        _ => print_trace_comparison(&comparison, every),
    }
    for (fy, trace) in comparison.fusion_years.iter().zip(&comparison.traces) {
        if let Some(year) = trace.outcome.collapse_year {
            println!("fusion {fy}: collapsed in {year} ({:?})", trace.outcome.collapse_cause);
        }
    }

    save(args.out_dir.as_deref(), "trace.json", &export::export_json(&comparison)?)?;
    Ok(())
}

fn print_trace_flows(trace: &PathTrace, every: usize) {
    println!(
        "{:<6} {:>6} {:>7} {:>9} {:>6} {:>9} {:>9} {:>9} {:>7} {:>7}",
        "Year", "T", "E", "Y", "I", "Damages", "Invest", "Maint", "Damp", "Share"
    );
    println!("{}", "-".repeat(86));
    for (i, s) in trace.steps.iter().enumerate() {
        if i % every != 0 && i + 1 != trace.steps.len() {
            continue;
        }
        println!(
            "{:<6} {:>6.2} {:>7.2} {:>9.2} {:>6.3} {:>9.3} {:>9.3} {:>9.3} {:>7.3} {:>7.3}",
            s.year,
            s.state.temperature,
            s.state.energy,
            s.state.output,
            s.state.stability,
            s.flows.damages,
            s.flows.investment,
            s.flows.maintenance,
            s.flows.growth_dampener,
            s.flows.fusion_share
        );
    }
}

fn print_trace_comparison(comparison: &TraceComparison, every: usize) {
    print!("{:<6}", "Year");
    for fy in &comparison.fusion_years {
        print!(" | {:^24}", format!("fusion {fy}"));
    }
    println!();
    print!("{:<6}", "");
    for _ in &comparison.fusion_years {
        print!(" | {:>9} {:>7} {:>6}", "Y", "E", "I");
    }
    println!();
    println!("{}", "-".repeat(6 + 27 * comparison.fusion_years.len()));

    let years = comparison.years();
    for (i, &year) in years.iter().enumerate() {
        if i % every != 0 && i + 1 != years.len() {
            continue;
        }
        print!("{year:<6}");
        for state in comparison.states_in(year) {
            match state {
                Some(v) => print!(" | {:>9.2} {:>7.2} {:>6.3}", v.output, v.energy, v.stability),
                None => print!(" | {:>24}", "n/a"),
            }
        }
        println!();
    }
}
