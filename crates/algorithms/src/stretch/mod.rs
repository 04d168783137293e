//! Percentile contrast stretching
//!
//! Stretches each band between two order statistics of its own
//! distribution, producing 8-bit output.

mod balance;
mod percentile;

pub use balance::{stretch_band, FlatBandPolicy, PercentileStretch, PercentileStretchParams};
pub use percentile::{cut_points, percentile};
