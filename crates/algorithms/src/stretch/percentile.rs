//! Order-statistic percentiles
//!
//! Linear interpolation between closest ranks, with 1-based ranks:
//!
//! ```text
//! rank = (n + 1) * p / 100
//! k    = floor(rank),  d = rank - k
//! P    = s[k-1] + d * (s[k] - s[k-1])
//! ```
//!
//! Ranks below 1 resolve to the minimum and ranks above `n` to the
//! maximum, so small samples with extreme `p` stay in bounds.

use geobalance_core::{Error, Result};

/// The `p`-th percentile of an ascending-sorted sample.
///
/// # Errors
/// - [`Error::InvalidParameter`] unless `0 < p <= 100`
/// - [`Error::EmptyBand`] for an empty sample
pub fn percentile(sorted: &[i32], p: f64) -> Result<f64> {
    if !(p > 0.0 && p <= 100.0) {
        return Err(Error::InvalidParameter {
            name: "percentile",
            value: p.to_string(),
            reason: "must lie in (0, 100]".to_string(),
        });
    }
    let n = sorted.len();
    if n == 0 {
        return Err(Error::EmptyBand);
    }

    let rank = (n as f64 + 1.0) * p / 100.0;
    if rank <= 1.0 {
        return Ok(sorted[0] as f64);
    }
    if rank >= n as f64 {
        return Ok(sorted[n - 1] as f64);
    }

    let k = rank.floor() as usize;
    let d = rank - k as f64;
    let lower = sorted[k - 1] as f64;
    let upper = sorted[k] as f64;
    Ok(lower + d * (upper - lower))
}

/// Low and high cuts at the `percent`-th and `(100 - percent)`-th percentiles
pub fn cut_points(sorted: &[i32], percent: f64) -> Result<(f64, f64)> {
    let low = percentile(sorted, percent)?;
    let high = percentile(sorted, 100.0 - percent)?;
    Ok((low, high))
}
