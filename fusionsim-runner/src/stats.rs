//! Cross-path statistics: percentiles, rank correlation, histograms and the
//! monotone outcome frontier.
//!
//! Every aggregate over a possibly-empty sample returns `Option`; `None`
//! means "no data", never zero.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::ensemble::{EnsembleSummary, TrajectoryMatrix};

// ─── Scalar aggregates ───────────────────────────────────────────────

/// Percentile of a sorted slice using linear interpolation between order
/// statistics. `p` is in percent.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        1 => Some(sorted[0]),
        _ => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = rank - lo as f64;
            Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
        }
    }
}

/// Percentile of an unsorted sample.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

// ─── Per-year percentile bands ───────────────────────────────────────

/// Cross-path percentiles for each simulated year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileBands {
    pub years: Vec<i32>,
    pub levels: Vec<f64>,
    /// `values[level][year]`.
    pub values: Vec<Vec<f64>>,
}

impl PercentileBands {
    pub fn level(&self, p: f64) -> Option<&[f64]> {
        self.levels
            .iter()
            .position(|&l| l == p)
            .map(|i| self.values[i].as_slice())
    }
}

/// Default band levels used in reports.
pub const DEFAULT_BAND_LEVELS: [f64; 5] = [10.0, 25.0, 50.0, 75.0, 90.0];

pub fn percentile_bands(matrix: &TrajectoryMatrix, levels: &[f64]) -> PercentileBands {
    let mut values = vec![Vec::with_capacity(matrix.n_years()); levels.len()];
    for year_idx in 0..matrix.n_years() {
        let mut column = matrix.column(year_idx);
        column.sort_by(f64::total_cmp);
        for (row, &p) in values.iter_mut().zip(levels) {
            row.push(percentile_sorted(&column, p).unwrap_or(f64::NAN));
        }
    }
    PercentileBands {
        years: matrix.years(),
        levels: levels.to_vec(),
        values,
    }
}

// ─── Rank correlation ────────────────────────────────────────────────

/// 1-based ranks with ties sharing their average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Pearson correlation; `None` for mismatched lengths, fewer than two
/// points or zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatentParameter {
    FusionYear,
    ClimateSensitivity,
    ConflictBrittleness,
    BaseGrowth,
}

impl LatentParameter {
    pub const ALL: [LatentParameter; 4] = [
        LatentParameter::FusionYear,
        LatentParameter::ClimateSensitivity,
        LatentParameter::ConflictBrittleness,
        LatentParameter::BaseGrowth,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LatentParameter::FusionYear => "fusion year",
            LatentParameter::ClimateSensitivity => "climate sensitivity",
            LatentParameter::ConflictBrittleness => "conflict brittleness",
            LatentParameter::BaseGrowth => "base growth",
        }
    }

    fn column<'a>(&self, summary: &'a EnsembleSummary) -> &'a [f64] {
        match self {
            LatentParameter::FusionYear => &summary.fusion_years,
            LatentParameter::ClimateSensitivity => &summary.climate_sensitivities,
            LatentParameter::ConflictBrittleness => &summary.brittleness,
            LatentParameter::BaseGrowth => &summary.base_growth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub parameter: LatentParameter,
    pub rho: Option<f64>,
}

/// Spearman correlation of each latent parameter with terminal output,
/// strongest negative first. Undefined correlations sort last.
pub fn latent_correlations(summary: &EnsembleSummary) -> Vec<Correlation> {
    let mut out: Vec<Correlation> = LatentParameter::ALL
        .iter()
        .map(|&parameter| Correlation {
            parameter,
            rho: spearman(parameter.column(summary), &summary.terminal_values),
        })
        .collect();
    out.sort_by(|a, b| match (a.rho, b.rho) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    out
}

// ─── Histogram ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `bins + 1` edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    /// Counts normalised so the histogram integrates to one.
    pub density: Vec<f64>,
}

/// Equal-width histogram over the sample range. The last bin is closed on
/// the right. A constant sample is spread over `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    if values.is_empty() || bins == 0 {
        return None;
    }
    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let n = values.len() as f64;
    let density = counts.iter().map(|&c| c as f64 / (n * width)).collect();

    Some(Histogram {
        edges,
        counts,
        density,
    })
}

/// Unit-width histogram for integer samples (years, durations): one bin per
/// integer from the minimum to the maximum, edges at `k ± 0.5`.
pub fn integer_histogram(values: &[i32]) -> Option<Histogram> {
    let lo = *values.iter().min()?;
    let hi = *values.iter().max()?;
    let bins = (hi - lo) as usize + 1;
    let edges: Vec<f64> = (0..=bins).map(|i| lo as f64 - 0.5 + i as f64).collect();
    let mut counts = vec![0usize; bins];
    for &v in values {
        counts[(v - lo) as usize] += 1;
    }
    let n = values.len() as f64;
    let density = counts.iter().map(|&c| c as f64 / n).collect();
    Some(Histogram {
        edges,
        counts,
        density,
    })
}

/// Bins used for the continuous outcome histograms.
pub const OUTCOME_HISTOGRAM_BINS: usize = 40;

/// Distributions of the per-path outcomes of one ensemble. `None` when the
/// underlying sample is empty (e.g. no path recovered).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeHistograms {
    pub nadir_value: Option<Histogram>,
    pub nadir_year: Option<Histogram>,
    pub recovery_duration: Option<Histogram>,
    pub terminal_value: Option<Histogram>,
}

impl OutcomeHistograms {
    /// Artifact-friendly names paired with each histogram.
    pub fn named(&self) -> [(&'static str, Option<&Histogram>); 4] {
        [
            ("nadir_value", self.nadir_value.as_ref()),
            ("nadir_year", self.nadir_year.as_ref()),
            ("recovery_duration", self.recovery_duration.as_ref()),
            ("terminal_value", self.terminal_value.as_ref()),
        ]
    }
}

pub fn outcome_histograms(summary: &EnsembleSummary) -> OutcomeHistograms {
    OutcomeHistograms {
        nadir_value: histogram(&summary.nadir_values, OUTCOME_HISTOGRAM_BINS),
        nadir_year: integer_histogram(&summary.nadir_years),
        recovery_duration: integer_histogram(&summary.recovery_durations),
        terminal_value: histogram(&summary.terminal_values, OUTCOME_HISTOGRAM_BINS),
    }
}

// ─── Frontier ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    /// Mean intervened value (effective fusion year) in the band.
    pub x: f64,
    /// Output percentile at the year implied by `x`.
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrontierConfig {
    /// Percentile levels run from `step` to `100 - step` in steps of `step`.
    pub level_step: f64,
    /// Half-width of the terminal-output band around each level.
    pub band: f64,
    pub max_window: usize,
    pub min_window: usize,
    pub degree: usize,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            level_step: 2.0,
            band: 3.0,
            max_window: 15,
            min_window: 5,
            degree: 3,
        }
    }
}

/// Outcome frontier: for each terminal-output percentile level, the mean
/// fusion year of paths ending in that band against the output percentile
/// in the year fusion arrived. Smoothed, then forced non-increasing in `x`.
pub fn frontier(
    matrix: &TrajectoryMatrix,
    intervened: &[f64],
    config: &FrontierConfig,
) -> Vec<FrontierPoint> {
    let n_years = matrix.n_years();
    if matrix.n_paths() == 0 || n_years == 0 || intervened.len() != matrix.n_paths() {
        return Vec::new();
    }

    let terminal = matrix.column(n_years - 1);
    let mut sorted_terminal = terminal.clone();
    sorted_terminal.sort_by(f64::total_cmp);

    let mut points = Vec::new();
    let mut level = config.level_step;
    while level < 100.0 - config.level_step / 2.0 {
        let bounds = (
            percentile_sorted(&sorted_terminal, (level - config.band).max(0.0)),
            percentile_sorted(&sorted_terminal, (level + config.band).min(100.0)),
        );
        if let (Some(lo), Some(hi)) = bounds {
            let in_band: Vec<f64> = terminal
                .iter()
                .zip(intervened)
                .filter(|(t, _)| **t >= lo && **t <= hi)
                .map(|(_, x)| *x)
                .collect();
            if let Some(x) = mean(&in_band) {
                let idx = (x.round() as i64 - matrix.start_year() as i64)
                    .clamp(0, n_years as i64 - 1) as usize;
                if let Some(y) = percentile(&matrix.column(idx), level) {
                    points.push(FrontierPoint { x, y });
                }
            }
        }
        level += config.level_step;
    }

    points.sort_by(|a, b| a.x.total_cmp(&b.x));

    let window = config.max_window.min(largest_odd_at_most(points.len()));
    if window >= config.min_window && window > config.degree {
        let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        let xs = savgol_smooth(&xs, window, config.degree);
        let ys = savgol_smooth(&ys, window, config.degree);
        for (p, (x, y)) in points.iter_mut().zip(xs.into_iter().zip(ys)) {
            p.x = x;
            p.y = y;
        }
        // Smoothing can reorder neighbouring x values.
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
    }

    let mut ys: Vec<f64> = points.iter().map(|p| p.y).collect();
    enforce_non_increasing(&mut ys);
    for (p, y) in points.iter_mut().zip(ys) {
        p.y = y;
    }
    points
}

fn largest_odd_at_most(n: usize) -> usize {
    if n == 0 {
        0
    } else if n % 2 == 1 {
        n
    } else {
        n - 1
    }
}

/// Backward pass: each value becomes the max of itself and everything after
/// it, so the sequence is non-increasing.
pub fn enforce_non_increasing(ys: &mut [f64]) {
    for i in (0..ys.len().saturating_sub(1)).rev() {
        ys[i] = ys[i].max(ys[i + 1]);
    }
}

/// Savitzky–Golay smoothing: each point is replaced by the value at that
/// point of a least-squares polynomial of `degree` over a `window`-wide
/// neighbourhood. Near the edges the window is clamped inside the series
/// and the fit is evaluated off-centre.
///
/// Returns the input unchanged when the window is not odd, exceeds the
/// series, or cannot support the degree.
pub fn savgol_smooth(values: &[f64], window: usize, degree: usize) -> Vec<f64> {
    let n = values.len();
    if window % 2 == 0 || window > n || window <= degree {
        return values.to_vec();
    }
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half).min(n - window);
            let slice = &values[start..start + window];
            let at = i as f64 - start as f64;
            polyfit_eval(slice, degree, at).unwrap_or(values[i])
        })
        .collect()
}

/// Least-squares polynomial fit of `ys` at abscissae `0..len`, evaluated at
/// `at`. Abscissae are centred for conditioning; the Vandermonde system is
/// solved by SVD.
fn polyfit_eval(ys: &[f64], degree: usize, at: f64) -> Option<f64> {
    let centre = (ys.len() - 1) as f64 / 2.0;
    let vandermonde = DMatrix::from_fn(ys.len(), degree + 1, |r, c| {
        (r as f64 - centre).powi(c as i32)
    });
    let rhs = DVector::from_column_slice(ys);
    let coeffs = vandermonde.svd(true, true).solve(&rhs, 1e-12).ok()?;
    let t = at - centre;
    Some(coeffs.as_slice().iter().rev().fold(0.0, |acc, c| acc * t + c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_sorted(&v, 0.0), Some(1.0));
        assert_eq!(percentile_sorted(&v, 100.0), Some(4.0));
        assert!((percentile_sorted(&v, 50.0).unwrap() - 2.5).abs() < 1e-12);
        assert!((percentile_sorted(&v, 25.0).unwrap() - 1.75).abs() < 1e-12);
    }

    #[test]
    fn empty_aggregates_are_none() {
        assert_eq!(percentile_sorted(&[], 50.0), None);
        assert_eq!(median(&[]), None);
        assert_eq!(mean(&[]), None);
        assert!(histogram(&[], 10).is_none());
    }

    #[test]
    fn median_unsorted() {
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
    }

    #[test]
    fn average_ranks_share_ties() {
        let r = average_ranks(&[10.0, 20.0, 20.0, 5.0]);
        assert_eq!(r, vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn spearman_monotone_is_one() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| v.powi(3)).collect();
        assert!((spearman(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        let neg: Vec<f64> = x.iter().map(|v| -v.exp()).collect();
        assert!((spearman(&x, &neg).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn spearman_constant_is_none() {
        assert_eq!(spearman(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(spearman(&[1.0, 2.0], &[1.0]), None);
    }

    #[test]
    fn histogram_counts_and_density() {
        let h = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert_eq!(h.edges, vec![0.0, 2.0, 4.0]);
        assert_eq!(h.counts, vec![2, 3]);
        let area: f64 = h.density.iter().map(|d| d * 2.0).sum();
        assert!((area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn histogram_constant_sample() {
        let h = histogram(&[7.0; 4], 4).unwrap();
        assert_eq!(h.edges[0], 6.5);
        assert_eq!(*h.edges.last().unwrap(), 7.5);
        assert_eq!(h.counts.iter().sum::<usize>(), 4);
    }

    #[test]
    fn integer_histogram_centres_bins_on_values() {
        let h = integer_histogram(&[2030, 2032, 2032, 2033]).unwrap();
        assert_eq!(h.edges, vec![2029.5, 2030.5, 2031.5, 2032.5, 2033.5]);
        assert_eq!(h.counts, vec![1, 0, 2, 1]);
        assert_eq!(h.density.iter().sum::<f64>(), 1.0);
        assert!(integer_histogram(&[]).is_none());
    }

    #[test]
    fn outcome_histograms_cover_every_path() {
        use fusionsim_core::ModelConfig;
        let mut summary = EnsembleSummary::from_outcomes(&[], &ModelConfig::default());
        summary.terminal_values = vec![10.0, 600.0, 250.0];
        summary.nadir_values = vec![90.0, 104.0, 0.5];
        summary.nadir_years = vec![2040, 2026, 2051];
        summary.recovery_durations = vec![];

        let h = outcome_histograms(&summary);
        assert_eq!(h.terminal_value.as_ref().unwrap().counts.len(), OUTCOME_HISTOGRAM_BINS);
        assert_eq!(h.nadir_value.as_ref().unwrap().counts.iter().sum::<usize>(), 3);
        assert_eq!(h.nadir_year.as_ref().unwrap().counts.len(), 26);
        assert!(h.recovery_duration.is_none());
        let names: Vec<&str> = h.named().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            ["nadir_value", "nadir_year", "recovery_duration", "terminal_value"]
        );
    }

    #[test]
    fn non_increasing_pass() {
        let mut ys = vec![3.0, 5.0, 2.0, 4.0, 1.0];
        enforce_non_increasing(&mut ys);
        assert_eq!(ys, vec![5.0, 5.0, 4.0, 4.0, 1.0]);
    }

    #[test]
    fn savgol_preserves_cubic() {
        let xs: Vec<f64> = (0..21)
            .map(|i| {
                let t = i as f64;
                0.5 * t * t * t - 2.0 * t * t + t - 3.0
            })
            .collect();
        let smoothed = savgol_smooth(&xs, 7, 3);
        for (a, b) in xs.iter().zip(&smoothed) {
            assert!((a - b).abs() < 1e-6 * a.abs().max(1.0), "{a} vs {b}");
        }
    }

    #[test]
    fn savgol_reduces_noise() {
        let ys: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let smoothed = savgol_smooth(&ys, 9, 3);
        let before: f64 = ys[5..25].iter().map(|v| v.abs()).sum();
        let after: f64 = smoothed[5..25].iter().map(|v| v.abs()).sum();
        assert!(after < before);
    }

    #[test]
    fn frontier_is_sorted_by_x_and_non_increasing() {
        let n_years = 20;
        let mut matrix = TrajectoryMatrix::new(2026, n_years);
        let mut intervened = Vec::new();
        for k in 0..200usize {
            let terminal = ((k * 37) % 200) as f64;
            let wobble = ((k * 13) % 7) as f64;
            let row: Vec<f64> = (0..n_years)
                .map(|i| terminal * (i + 1) as f64 / n_years as f64 + wobble)
                .collect();
            matrix.push_row(&row);
            intervened.push(2026.0 + ((k * 53) % 20) as f64 + 0.5 * ((k * 7) % 3) as f64);
        }

        let points = frontier(&matrix, &intervened, &FrontierConfig::default());
        assert_eq!(points.len(), 49);
        assert!(points.windows(2).all(|w| w[0].x <= w[1].x));
        assert!(points.windows(2).all(|w| w[0].y >= w[1].y));
    }

    #[test]
    fn savgol_short_series_untouched() {
        let ys = vec![1.0, 4.0, 2.0];
        assert_eq!(savgol_smooth(&ys, 5, 3), ys);
    }
}
