//! Export of run artifacts.
//!
//! - **JSON**: full serde serialization of summaries and reports
//! - **CSV**: percentile bands, intervention tables, gradients, robustness
//!   rows, discount table, frontier and outcome histograms, for plotting
//!   elsewhere
//!
//! Undefined statistics are written as empty CSV cells.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::intervention::{InterventionResult, SummaryStatistic};
use crate::robustness::RobustnessRow;
use crate::social_return::SocialReturnReport;
use crate::stats::{FrontierPoint, Histogram, PercentileBands};

fn cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: year, then one `p{level}` column per band level.
pub fn export_bands_csv(bands: &PercentileBands) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["year".to_string()];
    header.extend(bands.levels.iter().map(|l| format!("p{l}")));
    wtr.write_record(&header)?;

    for (i, year) in bands.years.iter().enumerate() {
        let mut record = vec![year.to_string()];
        record.extend(bands.values.iter().map(|row| format!("{:.6}", row[i])));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Columns: fusion_year, then every summary statistic.
pub fn export_intervention_csv(result: &InterventionResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["fusion_year"];
    header.extend(SummaryStatistic::ALL.iter().map(|s| s.label()));
    wtr.write_record(&header)?;

    for point in &result.points {
        let mut record = vec![format!("{}", point.value)];
        record.extend(SummaryStatistic::ALL.iter().map(|s| cell(s.of(&point.summary))));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Columns: lower, upper, midpoint, then one gradient column per statistic.
pub fn export_gradients_csv(result: &InterventionResult, stats: &[SummaryStatistic]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["lower".to_string(), "upper".to_string(), "midpoint".to_string()];
    header.extend(stats.iter().map(|s| format!("d_{}", s.label())));
    wtr.write_record(&header)?;

    let per_stat: Vec<_> = stats.iter().map(|&s| result.gradients(s)).collect();
    let Some(first) = per_stat.first() else {
        return finish(wtr);
    };
    for (i, g) in first.iter().enumerate() {
        let mut record = vec![
            format!("{}", g.lower),
            format!("{}", g.upper),
            format!("{}", g.midpoint),
        ];
        record.extend(per_stat.iter().map(|grads| cell(grads[i].gradient)));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

pub fn export_robustness_csv(rows: &[RobustnessRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "calibration",
        "abundance_pct",
        "never_recovered_pct",
        "collapse_pct",
        "median_terminal",
        "mean_terminal",
        "no_downturn_pct",
    ])?;
    for r in rows {
        wtr.write_record([
            r.label.clone(),
            format!("{:.2}", r.abundance_pct),
            format!("{:.2}", r.never_recovered_pct),
            format!("{:.2}", r.collapse_pct),
            cell(r.median_terminal),
            cell(r.mean_terminal),
            format!("{:.2}", r.no_downturn_pct),
        ])?;
    }
    finish(wtr)
}

pub fn export_discount_csv(report: &SocialReturnReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["rate", "label", "present_value", "ratio_to_cost"])?;
    for row in &report.discount_table {
        wtr.write_record([
            format!("{}", row.rate),
            row.label.clone(),
            format!("{:.6}", row.present_value),
            format!("{:.3}", row.ratio_to_cost),
        ])?;
    }
    finish(wtr)
}

pub fn export_frontier_csv(points: &[FrontierPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["fusion_year", "output"])?;
    for p in points {
        wtr.write_record([format!("{:.4}", p.x), format!("{:.6}", p.y)])?;
    }
    finish(wtr)
}

/// Columns: bin_lo, bin_hi, count, density.
pub fn export_histogram_csv(histogram: &Histogram) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bin_lo", "bin_hi", "count", "density"])?;
    for (i, (count, density)) in histogram.counts.iter().zip(&histogram.density).enumerate() {
        wtr.write_record([
            format!("{:.6}", histogram.edges[i]),
            format!("{:.6}", histogram.edges[i + 1]),
            count.to_string(),
            format!("{density:.6}"),
        ])?;
    }
    finish(wtr)
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write `contents` to `dir/name`, creating `dir` if needed.
pub fn write_artifact(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
