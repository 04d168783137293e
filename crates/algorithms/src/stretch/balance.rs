//! Percentile contrast stretch ("white balance")
//!
//! Maps the `p`-th and `(100 - p)`-th percentiles of a band onto 0 and
//! 255, scaling linearly in between and clipping outliers. Each band is
//! stretched against its own distribution.

use super::percentile::cut_points;
use crate::maybe_rayon::*;
use geobalance_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to produce for a band whose cuts coincide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlatBandPolicy {
    /// Fail with [`Error::DegenerateDistribution`]
    #[default]
    Fail,
    /// Fill the band with a fixed value
    Constant(u8),
}

/// Parameters for the percentile stretch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileStretchParams {
    /// Percentage clipped at each end of the distribution, in (0, 50)
    pub percent: f64,
    pub on_flat: FlatBandPolicy,
}

impl Default for PercentileStretchParams {
    fn default() -> Self {
        Self {
            percent: 0.6,
            on_flat: FlatBandPolicy::Fail,
        }
    }
}

impl PercentileStretchParams {
    pub fn new(percent: f64) -> Self {
        Self {
            percent,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.percent > 0.0 && self.percent < 50.0) {
            return Err(Error::InvalidParameter {
                name: "percent",
                value: self.percent.to_string(),
                reason: "must lie in (0, 50)".to_string(),
            });
        }
        Ok(())
    }
}

/// Percentile stretch algorithm
#[derive(Debug, Clone, Default)]
pub struct PercentileStretch;

impl Algorithm for PercentileStretch {
    type Input = Vec<i32>;
    type Output = Vec<u8>;
    type Params = PercentileStretchParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "PercentileStretch"
    }

    fn description(&self) -> &'static str {
        "Stretch a band between two percentiles of its own distribution onto 0-255"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        stretch_band(&input, &params)
    }
}

/// Stretch one band, given in row-major order.
///
/// ```text
/// out = clamp((v - low) * 255 / (high - low), 0, 255), truncated
/// ```
///
/// The whole band is needed because the cuts are global statistics; a
/// sorted copy is made and the original order is kept for the remap.
///
/// # Errors
/// - [`Error::InvalidParameter`] for a percent outside (0, 50)
/// - [`Error::EmptyBand`] for a band without samples
/// - [`Error::DegenerateDistribution`] when the cuts coincide and the
///   policy is [`FlatBandPolicy::Fail`]
pub fn stretch_band(values: &[i32], params: &PercentileStretchParams) -> Result<Vec<u8>> {
    params.validate()?;
    if values.is_empty() {
        return Err(Error::EmptyBand);
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let (low, high) = cut_points(&sorted, params.percent)?;
    debug!(low, high, samples = values.len(), "percentile cuts");

    if high <= low {
        return match params.on_flat {
            FlatBandPolicy::Fail => Err(Error::DegenerateDistribution { cut: low }),
            FlatBandPolicy::Constant(fill) => Ok(vec![fill; values.len()]),
        };
    }

    Ok(values
        .into_par_iter()
        .map(|&v| to_byte((v as f64 - low) * 255.0 / (high - low)))
        .collect())
}

/// Clip into 0..=255, truncating the fraction
fn to_byte(value: f64) -> u8 {
    if value < 0.0 {
        0
    } else if value > 255.0 {
        255
    } else {
        value as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECILES: [i32; 10] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

    #[test]
    fn test_reference_scenario() {
        // cuts at 11 and 99
        let params = PercentileStretchParams::new(10.0);
        let out = stretch_band(&DECILES, &params).unwrap();
        assert_eq!(out[0], 0);
        assert_eq!(out[9], 255);
        // (50 - 11) * 255 / 88 = 113.01
        assert_eq!(out[4], 113);
    }

    #[test]
    fn test_midpoint_sample() {
        // n = 11: cuts at 12 and 98, so 55 sits exactly halfway
        let band = [10, 20, 30, 40, 50, 55, 60, 70, 80, 90, 100];
        let out = stretch_band(&band, &PercentileStretchParams::new(10.0)).unwrap();
        assert_eq!(out[5], 127);
        assert_eq!(out[0], 0);
        assert_eq!(out[10], 255);
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        // (55 - 11) * 255 / 88 = 127.5 -> 127
        assert_eq!(to_byte((55.0 - 11.0) * 255.0 / (99.0 - 11.0)), 127);
        assert_eq!(to_byte(254.99), 254);
    }

    #[test]
    fn test_clamps_outside_cuts() {
        assert_eq!(to_byte(-2.9), 0);
        assert_eq!(to_byte(257.8), 255);
    }

    #[test]
    fn test_keeps_pixel_order() {
        let band = [100, 10, 55, 90, 20, 80, 30, 70, 40, 60, 50];
        let out = stretch_band(&band, &PercentileStretchParams::new(10.0)).unwrap();
        assert_eq!(out[0], 255);
        assert_eq!(out[1], 0);
        assert!(out[2] > out[10], "55 must stretch above 50");
    }

    #[test]
    fn test_monotonic() {
        let band: Vec<i32> = (0..500).map(|i| (i * 37) % 1000).collect();
        let out = stretch_band(&band, &PercentileStretchParams::default()).unwrap();

        let mut pairs: Vec<(i32, u8)> = band.iter().copied().zip(out).collect();
        pairs.sort_unstable();
        for w in pairs.windows(2) {
            assert!(w[0].1 <= w[1].1, "{:?} then {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn test_uniform_band_is_nearly_unchanged() {
        let band: Vec<i32> = (0..256).flat_map(|v| std::iter::repeat(v).take(4)).collect();
        let out = stretch_band(&band, &PercentileStretchParams::new(0.01)).unwrap();
        for (&v, &s) in band.iter().zip(&out) {
            assert!((v - s as i32).abs() <= 1, "{} stretched to {}", v, s);
        }
    }

    #[test]
    fn test_flat_band_fails_by_default() {
        let band = vec![42; 100];
        assert!(matches!(
            stretch_band(&band, &PercentileStretchParams::default()),
            Err(Error::DegenerateDistribution { .. })
        ));
    }

    #[test]
    fn test_flat_band_constant_policy() {
        let params = PercentileStretchParams {
            percent: 0.6,
            on_flat: FlatBandPolicy::Constant(127),
        };
        assert_eq!(stretch_band(&[42; 9], &params).unwrap(), vec![127; 9]);
    }

    #[test]
    fn test_rejects_bad_percent() {
        for percent in [0.0, 50.0, 75.0, -3.0] {
            assert!(matches!(
                stretch_band(&DECILES, &PercentileStretchParams::new(percent)),
                Err(Error::InvalidParameter { name: "percent", .. })
            ));
        }
    }

    #[test]
    fn test_empty_band() {
        assert!(matches!(
            stretch_band(&[], &PercentileStretchParams::default()),
            Err(Error::EmptyBand)
        ));
    }

    #[test]
    fn test_algorithm_trait() {
        let algo = PercentileStretch;
        assert_eq!(algo.name(), "PercentileStretch");
        let out = algo.execute(DECILES.to_vec(), PercentileStretchParams::new(10.0)).unwrap();
        assert_eq!(out.len(), 10);
        assert!(algo.execute_default(vec![5; 4]).is_err());
    }
}
