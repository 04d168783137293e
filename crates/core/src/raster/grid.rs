//! In-memory multi-band raster

use crate::error::{Error, Result};
use crate::raster::{ColorRole, GeoReference, PixelType};
use ndarray::{Array2, ArrayView1};

/// One channel of a raster: a declared color role over a 2D sample grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    role: ColorRole,
    /// Samples in row-major order (row, col)
    data: Array2<i32>,
}

impl Band {
    pub fn role(&self) -> ColorRole {
        self.role
    }

    pub fn data(&self) -> &Array2<i32> {
        &self.data
    }

    /// Get a row view
    pub fn row(&self, row: usize) -> ArrayView1<'_, i32> {
        self.data.row(row)
    }
}

/// A georeferenced raster held entirely in memory.
///
/// All bands share the raster's width and height and its pixel type.
/// Bands are addressed 1-indexed, the way GDAL numbers them.
///
/// # Example
///
/// ```ignore
/// use geobalance_core::{ColorRole, PixelType, Raster};
///
/// let mut rgb = Raster::new(256, 256, PixelType::U8, &ColorRole::RGB);
/// rgb.set(1, 10, 20, 200)?;
/// assert_eq!(rgb.get(1, 10, 20)?, 200);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    rows: usize,
    cols: usize,
    pixel_type: PixelType,
    bands: Vec<Band>,
    georef: GeoReference,
}

impl Raster {
    /// Create a zero-filled raster with one band per role
    pub fn new(rows: usize, cols: usize, pixel_type: PixelType, roles: &[ColorRole]) -> Self {
        let bands = roles
            .iter()
            .map(|&role| Band {
                role,
                data: Array2::zeros((rows, cols)),
            })
            .collect();
        Self {
            rows,
            cols,
            pixel_type,
            bands,
            georef: GeoReference::default(),
        }
    }

    /// Create a raster from row-major sample vectors, one per band.
    ///
    /// Samples are saturated into the pixel type's range.
    pub fn from_bands(
        rows: usize,
        cols: usize,
        pixel_type: PixelType,
        bands: Vec<(ColorRole, Vec<i32>)>,
    ) -> Result<Self> {
        let bands = bands
            .into_iter()
            .map(|(role, samples)| {
                if samples.len() != rows * cols {
                    return Err(Error::InvalidDimensions {
                        width: cols,
                        height: rows,
                    });
                }
                let samples = samples.into_iter().map(|v| pixel_type.saturate(v)).collect();
                let data = Array2::from_shape_vec((rows, cols), samples)
                    .map_err(|e| Error::Other(e.to_string()))?;
                Ok(Band { role, data })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rows,
            cols,
            pixel_type,
            bands,
            georef: GeoReference::default(),
        })
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    // Bands

    /// Band by 1-based index
    pub fn band(&self, index: usize) -> Result<&Band> {
        let band_count = self.bands.len();
        index
            .checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .ok_or(Error::MissingBand {
                band: index,
                band_count,
            })
    }

    fn band_mut(&mut self, index: usize) -> Result<&mut Band> {
        let band_count = self.bands.len();
        index
            .checked_sub(1)
            .and_then(|i| self.bands.get_mut(i))
            .ok_or(Error::MissingBand {
                band: index,
                band_count,
            })
    }

    /// Declared roles of all bands, in band order
    pub fn roles(&self) -> Vec<ColorRole> {
        self.bands.iter().map(Band::role).collect()
    }

    pub fn set_role(&mut self, index: usize, role: ColorRole) -> Result<()> {
        self.band_mut(index)?.role = role;
        Ok(())
    }

    // Samples

    pub fn get(&self, band: usize, row: usize, col: usize) -> Result<i32> {
        let (rows, cols) = self.shape();
        self.band(band)?
            .data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })
    }

    /// Set a sample, saturating it into the pixel type's range
    pub fn set(&mut self, band: usize, row: usize, col: usize, value: i32) -> Result<()> {
        let (rows, cols) = self.shape();
        let value = self.pixel_type.saturate(value);
        let cell = self
            .band_mut(band)?
            .data
            .get_mut((row, col))
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })?;
        *cell = value;
        Ok(())
    }

    /// Copy one row of a band into `buf`
    pub fn read_row_into(&self, band: usize, row: usize, buf: &mut [i32]) -> Result<()> {
        self.check_row(row, buf.len())?;
        let src = self.band(band)?.row(row);
        for (dst, &v) in buf.iter_mut().zip(src.iter()) {
            *dst = v;
        }
        Ok(())
    }

    /// Overwrite one row of a band, saturating samples
    pub fn write_row_from(&mut self, band: usize, row: usize, samples: &[i32]) -> Result<()> {
        self.check_row(row, samples.len())?;
        let pixel_type = self.pixel_type;
        let mut dst = self.band_mut(band)?.data.row_mut(row);
        for (d, &v) in dst.iter_mut().zip(samples) {
            *d = pixel_type.saturate(v);
        }
        Ok(())
    }

    /// All samples of a band in row-major order
    pub fn band_samples(&self, band: usize) -> Result<Vec<i32>> {
        Ok(self.band(band)?.data.iter().copied().collect())
    }

    /// Overwrite a whole band from row-major samples
    pub fn set_band_samples(&mut self, band: usize, samples: &[i32]) -> Result<()> {
        if samples.len() != self.rows * self.cols {
            return Err(Error::InvalidDimensions {
                width: self.cols,
                height: self.rows,
            });
        }
        let pixel_type = self.pixel_type;
        let data = &mut self.band_mut(band)?.data;
        for (d, &v) in data.iter_mut().zip(samples) {
            *d = pixel_type.saturate(v);
        }
        Ok(())
    }

    fn check_row(&self, row: usize, len: usize) -> Result<()> {
        if row >= self.rows {
            return Err(Error::IndexOutOfBounds {
                row,
                col: 0,
                rows: self.rows,
                cols: self.cols,
            });
        }
        if len != self.cols {
            return Err(Error::SizeMismatch {
                er: 1,
                ec: self.cols,
                ar: 1,
                ac: len,
            });
        }
        Ok(())
    }

    // Metadata

    pub fn georef(&self) -> &GeoReference {
        &self.georef
    }

    pub fn set_georef(&mut self, georef: GeoReference) {
        self.georef = georef;
    }
}
