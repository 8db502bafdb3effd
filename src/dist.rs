//! Zero-truncated-Poisson distribution fitter for SED and ignition tables.
use crate::errors::CalError;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Upper bound on enumerated tail values.  A root solve that wanders can
/// leave the enumeration chasing a mean it will never cover; the cap turns
/// that into a [CalError::SolveError] instead of an unbounded loop.  Sits
/// below the point where `x!` overflows an f64 (171), so the cap governs
/// termination; plausible SED tables run a few dozen values at most.
const MAX_TAIL: usize = 150;

/// Discriminator for the engine's shared distribution table.  The engine
/// recognizes exactly two distribution names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistName {
    /// Spread-event-duration distribution.
    Sed,
    /// Ignitions-per-iteration distribution.
    Igns,
}

impl DistName {
    /// The column value the engine expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistName::Sed => "SED",
            DistName::Igns => "Igns",
        }
    }
}

impl FromStr for DistName {
    type Err = CalError;

    fn from_str(s: &str) -> Result<Self, CalError> {
        match s {
            "SED" => Ok(DistName::Sed),
            "Igns" => Ok(DistName::Igns),
            _ => Err(CalError::NameError),
        }
    }
}

/// One row of the engine's `DistributionValue` datasheet.  Relative
/// frequencies need not sum to one; the engine normalizes on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistRow {
    /// Distribution discriminator, "SED" or "Igns".
    #[serde(rename = "Name")]
    pub name: String,
    /// Discrete outcome (days of spread, or fire starts per iteration).
    #[serde(rename = "Value")]
    pub value: f64,
    /// Weight of the outcome.
    #[serde(rename = "RelativeFrequency")]
    pub relative_frequency: f64,
}

impl DistRow {
    /// Tag a (value, weight) pair with a distribution name.
    pub fn new(name: DistName, value: f64, relative_frequency: f64) -> Self {
        DistRow {
            name: name.as_str().to_string(),
            value,
            relative_frequency,
        }
    }
}

/// Point probability mass of a zero-truncated Poisson law with rate `l` at
/// integer `x >= 1`:  `l^x e^-l / (x! (1 - e^-l))`.
/// Returns a non-finite value when `l <= 0`, when `x` is the excluded zero
/// outcome, or when `x!` overflows an f64; callers must guard.
pub fn ztp(l: f64, x: u32) -> f64 {
    if l <= 0.0 || x == 0 {
        return f64::NAN;
    }
    let mut fact = 1f64;
    for i in 2..=x {
        fact *= f64::from(i);
    }
    if !fact.is_finite() {
        return f64::NAN;
    }
    (l.powi(x as i32) * (-l).exp()) / (fact * (1.0 - (-l).exp()))
}

/// Residual of the mean equation for the zero-truncated Poisson law:
/// `l e^l / (e^l - 1) - mu`, evaluated as `l / (1 - e^-l) - mu` so large
/// rates do not overflow.  The root in `l` gives the rate whose truncated
/// mean equals `mu`.
pub fn ztp_mean(l: f64, mu: f64) -> f64 {
    l / (1.0 - (-l).exp()) - mu
}

/// Solve for the rate matching truncated mean `mu`.  Newton iteration
/// seeded at 0.01; falls back to bisection on a bracketing interval if
/// Newton leaves the positive domain or fails to close.
fn solve_rate(mu: f64) -> Result<f64, CalError> {
    match utils::newton(|l| ztp_mean(l, mu), 0.01) {
        Ok(l) if l > 0.0 => Ok(l),
        _ => utils::bisect(|l| ztp_mean(l, mu), 1e-9, mu * 2.0 + 50.0),
    }
}

/// Build a zero-truncated Poisson table with mean `mu` for the named
/// distribution.
///
///  - `name` must be "SED" or "Igns", the two distributions the engine
///    accepts; anything else is a [CalError::NameError].
///  - `mu` must be at least 1; no zero-truncated law has a smaller mean.
///  - `mu == 1` returns the degenerate single-row table (value 1, weight 1),
///    sidestepping the rate singularity at the boundary.
///  - Otherwise values enumerate from 1 while the tail probability exceeds
///    one percent or the value has not yet reached `mu`, so the table always
///    covers the target mean even when the tail is already thin.
///
/// # Examples
///
/// ```rust
/// use sedtune::prelude::*;
///
/// fn main() -> Result<(), CalError> {
///     let sed = ztp_dist("SED", 3.0)?;
///     assert!(sed.last().unwrap().value >= 3.0);
///     Ok(())
/// }
/// ```
pub fn ztp_dist(name: &str, mu: f64) -> Result<Vec<DistRow>, CalError> {
    let name = DistName::from_str(name)?;
    if !(mu >= 1.0) {
        return Err(CalError::SolveError);
    }
    if mu == 1.0 {
        return Ok(vec![DistRow::new(name, 1.0, 1.0)]);
    }
    let l = solve_rate(mu)?;
    enumerate_tail(name, l, mu)
}

/// Enumerate the (value, probability) table for rate `l` until the tail
/// drops below one percent and the value has covered `mu`.  A rate that
/// cannot satisfy both conditions within [MAX_TAIL] values is a
/// [CalError::SolveError].
fn enumerate_tail(name: DistName, l: f64, mu: f64) -> Result<Vec<DistRow>, CalError> {
    let mut rows = Vec::new();
    let mut x = 1u32;
    let mut prob = ztp(l, x);
    rows.push(DistRow::new(name, f64::from(x), prob));
    while prob > 0.01 || f64::from(x) < mu {
        x += 1;
        prob = ztp(l, x);
        if !prob.is_finite() || rows.len() >= MAX_TAIL {
            return Err(CalError::SolveError);
        }
        rows.push(DistRow::new(name, f64::from(x), prob));
    }
    Ok(rows)
}
