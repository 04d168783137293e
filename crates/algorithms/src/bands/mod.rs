//! Band selection

mod locator;

pub use locator::{locate_band, locate_bands, BandFallback, BandMatch, Resolution};
