use crate::errors::CalError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Calculate the mean of a slice of f64 values.
///  - `numbers` is a reference to a slice of f64 values.
///  - Returns the mean of `numbers`.
///
/// # Examples
///
/// ```rust
/// let numbers = vec![1.0, 1.5, 2.0, 2.5, 3.0];
/// let mn = sedtune::utils::mean(&numbers);
/// assert_eq!(2.0, mn);
/// ```
pub fn mean(numbers: &[f64]) -> f64 {
    let sum: f64 = numbers.iter().sum();

    sum as f64 / numbers.len() as f64
}

/// Calculate the mean of a discrete distribution given as (value, weight) pairs.
/// Weights may be probabilities, percentages or raw counts; only their
/// relative magnitudes matter.
///
/// # Examples
///
/// ```rust
/// let pairs = vec![(1.0, 50.0), (3.0, 50.0)];
/// let mn = sedtune::utils::weighted_mean(&pairs);
/// assert_eq!(2.0, mn);
/// ```
pub fn weighted_mean(pairs: &[(f64, f64)]) -> f64 {
    let total: f64 = pairs.iter().map(|x| x.1).sum();
    let sum: f64 = pairs.iter().map(|x| x.0 * x.1).sum();

    sum / total
}

/// Find a root of `f` by Newton iteration with a numeric derivative,
/// starting from `seed`.
///  - Returns [CalError::SolveError] if the iterate leaves the finite domain
///    or the residual has not closed within `MAX_NEWTON` steps.
pub fn newton<F: Fn(f64) -> f64>(f: F, seed: f64) -> Result<f64, CalError> {
    const MAX_NEWTON: usize = 100;
    const STEP: f64 = 1e-7;
    const TOL: f64 = 1e-10;
    let mut x = seed;
    for _ in 0..MAX_NEWTON {
        let fx = f(x);
        if !fx.is_finite() {
            return Err(CalError::SolveError);
        }
        if fx.abs() < TOL {
            return Ok(x);
        }
        let slope = (f(x + STEP) - f(x - STEP)) / (2.0 * STEP);
        if slope == 0.0 || !slope.is_finite() {
            return Err(CalError::SolveError);
        }
        x -= fx / slope;
    }
    Err(CalError::SolveError)
}

/// Find a root of `f` by bisection on `[lo, hi]`.
/// The interval must bracket a sign change.
pub fn bisect<F: Fn(f64) -> f64>(f: F, lo: f64, hi: f64) -> Result<f64, CalError> {
    const MAX_BISECT: usize = 200;
    const TOL: f64 = 1e-10;
    let mut lo = lo;
    let mut hi = hi;
    let flo = f(lo);
    if flo.signum() == f(hi).signum() {
        return Err(CalError::SolveError);
    }
    for _ in 0..MAX_BISECT {
        let mid = (lo + hi) / 2.0;
        let fmid = f(mid);
        if fmid.abs() < TOL || (hi - lo) / 2.0 < TOL {
            return Ok(mid);
        }
        if fmid.signum() == flo.signum() {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok((lo + hi) / 2.0)
}

/// Read rows of type `T` from a headered csv file.
/// Columns bind by name, so extra columns in `path` are ignored and a
/// missing or mistyped column fails the load.
pub fn read_csv<T: DeserializeOwned>(path: &std::path::Path) -> Result<Vec<T>, CalError> {
    let mut dat = Vec::new();
    let var = std::fs::File::open(path)?;
    let mut rdr = csv::Reader::from_reader(var);
    for result in rdr.deserialize() {
        let row: T = result?;
        dat.push(row);
    }
    Ok(dat)
}

/// Write tabular results to a csv file.
pub fn record<T: Serialize>(rec: &[T], path: &std::path::Path) -> Result<(), CalError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for i in rec {
        wtr.serialize(i)?;
    }
    wtr.flush()?;
    Ok(())
}
