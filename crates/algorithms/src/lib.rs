//! # geobalance Algorithms
//!
//! Band operations for RGB(A) rasters.
//!
//! ## Modules
//!
//! - **bands**: locate red, green, blue and alpha by declared color role
//! - **transform**: row-streamed per-pixel transforms
//! - **stretch**: percentile contrast stretch ("white balance")
//! - **pipeline**: end-to-end workflows over any raster backend

pub mod bands;
pub mod cancel;
pub(crate) mod maybe_rayon;
pub mod pipeline;
pub mod stretch;
pub mod transform;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bands::{locate_band, locate_bands, BandFallback, BandMatch, Resolution};
    pub use crate::cancel::CancelToken;
    pub use crate::pipeline::{rewrite_file, rewrite_rgba, white_balance, white_balance_file};
    pub use crate::stretch::{
        cut_points, percentile, stretch_band, FlatBandPolicy, PercentileStretch,
        PercentileStretchParams,
    };
    pub use crate::transform::{identity, offset, stream_transform};
    pub use geobalance_core::prelude::*;
}
