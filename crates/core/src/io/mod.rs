//! Raster access contract and its backends
//!
//! Processing code talks to rasters only through [`RasterDataset`] and
//! [`RasterDriver`]. Three backends implement them:
//! - [`Raster`] / [`MemDriver`]: in memory
//! - [`GeoTiffDriver`]: native GeoTIFF on the `tiff` crate
//! - `GdalDriver`: GDAL bindings, behind the `gdal` feature

#[cfg(feature = "gdal")]
mod gdal_io;
mod memory;
mod native;

#[cfg(feature = "gdal")]
pub use gdal_io::{GdalDataset, GdalDriver};
pub use memory::{MemDataset, MemDriver};
pub use native::{GeoTiffDataset, GeoTiffDriver};

/// Driver used by path-level workflows
#[cfg(feature = "gdal")]
pub type DefaultDriver = GdalDriver;
/// Driver used by path-level workflows
#[cfg(not(feature = "gdal"))]
pub type DefaultDriver = GeoTiffDriver;

use crate::error::{Error, Result};
use crate::raster::{ColorRole, GeoReference, PixelType, Raster};
use std::path::Path;

/// Layout of a raster to create
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOptions {
    pub width: usize,
    pub height: usize,
    pub pixel_type: PixelType,
    /// One entry per band; each created band declares its role
    pub roles: Vec<ColorRole>,
}

impl CreateOptions {
    pub fn new(width: usize, height: usize, pixel_type: PixelType, roles: &[ColorRole]) -> Self {
        Self {
            width,
            height,
            pixel_type,
            roles: roles.to_vec(),
        }
    }

    pub fn band_count(&self) -> usize {
        self.roles.len()
    }
}

/// An open raster: bands addressed 1..=band_count, samples as `i32`.
///
/// Writes saturate samples into the dataset's pixel type. A written
/// dataset must be flushed before its contents are durable.
pub trait RasterDataset {
    /// Dimensions as (cols, rows)
    fn size(&self) -> (usize, usize);

    fn band_count(&self) -> usize;

    fn pixel_type(&self) -> PixelType;

    /// Declared color role of a band
    fn color_role(&self, band: usize) -> Result<ColorRole>;

    fn geo_reference(&self) -> Result<GeoReference>;

    fn set_geo_reference(&mut self, georef: &GeoReference) -> Result<()>;

    /// Read row `row` of `band` into `buf`, which must be one row wide
    fn read_row(&self, band: usize, row: usize, buf: &mut [i32]) -> Result<()>;

    fn write_row(&mut self, band: usize, row: usize, samples: &[i32]) -> Result<()>;

    /// Read a whole band in row-major order
    fn read_band(&self, band: usize) -> Result<Vec<i32>> {
        let (cols, rows) = self.size();
        let mut data = vec![0; cols * rows];
        if cols > 0 {
            for (row, chunk) in data.chunks_mut(cols).enumerate() {
                self.read_row(band, row, chunk)?;
            }
        }
        Ok(data)
    }

    /// Write a whole band from row-major samples
    fn write_band(&mut self, band: usize, samples: &[i32]) -> Result<()> {
        let (cols, rows) = self.size();
        if samples.len() != cols * rows {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        if cols > 0 {
            for (row, chunk) in samples.chunks(cols).enumerate() {
                self.write_row(band, row, chunk)?;
            }
        }
        Ok(())
    }

    /// Make all writes durable
    fn flush(&mut self) -> Result<()>;

    /// Drop unflushed writes so that closing the dataset persists nothing
    /// further. Used when a job fails and its output is abandoned.
    fn discard(&mut self) {}
}

/// Opens and creates datasets of one backend
pub trait RasterDriver {
    type Dataset: RasterDataset;

    fn open(&self, path: &Path) -> Result<Self::Dataset>;

    fn create(&self, path: &Path, options: &CreateOptions) -> Result<Self::Dataset>;

    /// Delete a raster, typically a partial output after [`RasterDataset::discard`]
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Relay affine transform and projection from `src` to `dst`
pub fn copy_geo_reference<S, D>(src: &S, dst: &mut D) -> Result<()>
where
    S: RasterDataset + ?Sized,
    D: RasterDataset + ?Sized,
{
    let georef = src.geo_reference()?;
    dst.set_geo_reference(&georef)
}

impl RasterDataset for Raster {
    fn size(&self) -> (usize, usize) {
        (self.cols(), self.rows())
    }

    fn band_count(&self) -> usize {
        Raster::band_count(self)
    }

    fn pixel_type(&self) -> PixelType {
        Raster::pixel_type(self)
    }

    fn color_role(&self, band: usize) -> Result<ColorRole> {
        Ok(self.band(band)?.role())
    }

    fn geo_reference(&self) -> Result<GeoReference> {
        Ok(self.georef().clone())
    }

    fn set_geo_reference(&mut self, georef: &GeoReference) -> Result<()> {
        self.set_georef(georef.clone());
        Ok(())
    }

    fn read_row(&self, band: usize, row: usize, buf: &mut [i32]) -> Result<()> {
        self.read_row_into(band, row, buf)
    }

    fn write_row(&mut self, band: usize, row: usize, samples: &[i32]) -> Result<()> {
        self.write_row_from(band, row, samples)
    }

    fn read_band(&self, band: usize) -> Result<Vec<i32>> {
        self.band_samples(band)
    }

    fn write_band(&mut self, band: usize, samples: &[i32]) -> Result<()> {
        self.set_band_samples(band, samples)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::raster::GeoTransform;

    #[test]
    fn test_default_band_io_goes_through_rows() {
        struct Rows(Raster);

        impl RasterDataset for Rows {
            fn size(&self) -> (usize, usize) {
                RasterDataset::size(&self.0)
            }
            fn band_count(&self) -> usize {
                self.0.band_count()
            }
            fn pixel_type(&self) -> PixelType {
                self.0.pixel_type()
            }
            fn color_role(&self, band: usize) -> Result<ColorRole> {
                self.0.color_role(band)
            }
            fn geo_reference(&self) -> Result<GeoReference> {
                self.0.geo_reference()
            }
            fn set_geo_reference(&mut self, georef: &GeoReference) -> Result<()> {
                self.0.set_geo_reference(georef)
            }
            fn read_row(&self, band: usize, row: usize, buf: &mut [i32]) -> Result<()> {
                self.0.read_row(band, row, buf)
            }
            fn write_row(&mut self, band: usize, row: usize, samples: &[i32]) -> Result<()> {
                self.0.write_row(band, row, samples)
            }
            fn flush(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let mut ds = Rows(Raster::new(2, 3, PixelType::U8, &[ColorRole::Red]));
        ds.write_band(1, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(ds.read_band(1).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert!(ds.write_band(1, &[1, 2]).is_err());
    }

    #[test]
    fn test_copy_geo_reference() {
        let mut src = Raster::new(2, 2, PixelType::U8, &ColorRole::RGB);
        let georef = GeoReference::new(
            GeoTransform::new(500_000.0, 9_000_000.0, 0.5, -0.5),
            Some(CRS::from_epsg(31984)),
        );
        src.set_georef(georef.clone());

        let mut dst = Raster::new(2, 2, PixelType::U8, &ColorRole::RGB);
        copy_geo_reference(&src, &mut dst).unwrap();
        assert_eq!(dst.georef(), &georef);
    }
}
