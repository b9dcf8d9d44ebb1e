//! Continuous discounting and break-even rate search.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DiscountError {
    #[error("no sign change in [{lo}, {hi}]: f(lo) = {f_lo}, f(hi) = {f_hi}")]
    NoSignChange {
        lo: f64,
        hi: f64,
        f_lo: f64,
        f_hi: f64,
    },

    #[error("{increments} increments but {years} years")]
    LengthMismatch { increments: usize, years: usize },
}

/// Per-year output gained from one year of acceleration:
/// `(early - late) / delta_years`, elementwise.
pub fn annual_increments(early: &[f64], late: &[f64], delta_years: f64) -> Vec<f64> {
    early
        .iter()
        .zip(late)
        .map(|(e, l)| (e - l) / delta_years)
        .collect()
}

/// `Σ inc_t · exp(−r · (year_t − base_year))`.
pub fn present_value(
    increments: &[f64],
    years: &[i32],
    base_year: i32,
    rate: f64,
) -> Result<f64, DiscountError> {
    if increments.len() != years.len() {
        return Err(DiscountError::LengthMismatch {
            increments: increments.len(),
            years: years.len(),
        });
    }
    Ok(increments
        .iter()
        .zip(years)
        .map(|(inc, &year)| inc * (-rate * f64::from(year - base_year)).exp())
        .sum())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakEvenSearch {
    pub lo: f64,
    pub hi: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for BreakEvenSearch {
    fn default() -> Self {
        Self {
            lo: 0.01,
            hi: 5.0,
            tolerance: 1e-10,
            max_iterations: 200,
        }
    }
}

/// Rate at which the present value of the increments equals `cost`, found
/// by bisection inside the search bracket.
pub fn break_even_rate(
    increments: &[f64],
    years: &[i32],
    base_year: i32,
    cost: f64,
    search: &BreakEvenSearch,
) -> Result<f64, DiscountError> {
    let f = |r: f64| present_value(increments, years, base_year, r).map(|pv| pv - cost);

    let (mut lo, mut hi) = (search.lo, search.hi);
    let mut f_lo = f(lo)?;
    let f_hi = f(hi)?;
    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }
    if f_lo.signum() == f_hi.signum() || f_lo.is_nan() || f_hi.is_nan() {
        return Err(DiscountError::NoSignChange { lo, hi, f_lo, f_hi });
    }

    for _ in 0..search.max_iterations {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid)?;
        if f_mid == 0.0 || (hi - lo) / 2.0 < search.tolerance {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}
