//! Error types for geobalance

use crate::raster::ColorRole;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for geobalance operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open raster {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Cannot create raster {path}: {reason}")]
    Create { path: PathBuf, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("No band declares the {role} role among {band_count} band(s)")]
    BandNotFound { role: ColorRole, band_count: usize },

    #[error("Band {band} is not available (raster has {band_count} band(s))")]
    MissingBand { band: usize, band_count: usize },

    #[error("Band has no samples")]
    EmptyBand,

    #[error("Percentile cuts coincide at {cut}; band has no spread to stretch")]
    DegenerateDistribution { cut: f64 },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

/// Result type alias for geobalance operations
pub type Result<T> = std::result::Result<T, Error>;
