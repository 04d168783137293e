//! Raster data structures

mod color;
mod georef;
mod grid;
mod pixel;

pub use color::ColorRole;
pub use georef::{GeoReference, GeoTransform};
pub use grid::{Band, Raster};
pub use pixel::PixelType;
