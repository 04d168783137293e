//! # geobalance Core
//!
//! Core types, traits and I/O for the geobalance raster tools.
//!
//! This crate provides:
//! - `Raster`: in-memory multi-band raster with declared color roles
//! - `GeoReference`: affine transform and CRS relayed between rasters
//! - `RasterDataset` / `RasterDriver`: the access contract every backend
//!   implements (in-memory, native GeoTIFF, GDAL)
//! - Algorithm trait for consistent API

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use io::{copy_geo_reference, CreateOptions, RasterDataset, RasterDriver};
pub use raster::{Band, ColorRole, GeoReference, GeoTransform, PixelType, Raster};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::io::{copy_geo_reference, CreateOptions, RasterDataset, RasterDriver};
    pub use crate::raster::{ColorRole, GeoReference, GeoTransform, PixelType, Raster};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in geobalance.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
