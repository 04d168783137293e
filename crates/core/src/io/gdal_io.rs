//! Raster access through GDAL
//!
//! GDAL closes (and flushes) a dataset when its handle is dropped, so
//! handles from this backend need no explicit release.

use super::{CreateOptions, RasterDataset, RasterDriver};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{ColorRole, GeoReference, GeoTransform, PixelType};
use gdal::raster::{Buffer, ColorInterpretation, GdalDataType};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use std::path::Path;
use tracing::debug;

/// Driver for any raster format GDAL can read; creates GeoTIFFs
#[derive(Debug, Clone)]
pub struct GdalDriver {
    /// Short name of the GDAL driver used by `create`
    pub create_driver: String,
}

impl Default for GdalDriver {
    fn default() -> Self {
        Self {
            create_driver: "GTiff".to_string(),
        }
    }
}

impl RasterDriver for GdalDriver {
    type Dataset = GdalDataset;

    fn open(&self, path: &Path) -> Result<GdalDataset> {
        let open_error = |reason: String| Error::Open {
            path: path.to_path_buf(),
            reason,
        };
        let dataset = Dataset::open(path).map_err(|e| open_error(e.to_string()))?;
        let pixel_type = if dataset.raster_count() > 0 {
            let band = dataset.rasterband(1)?;
            pixel_type_of(band.band_type()).map_err(|e| open_error(e.to_string()))?
        } else {
            PixelType::U8
        };
        Ok(GdalDataset {
            dataset,
            pixel_type,
        })
    }

    fn create(&self, path: &Path, options: &CreateOptions) -> Result<GdalDataset> {
        let create_error = |reason: String| Error::Create {
            path: path.to_path_buf(),
            reason,
        };
        let driver = DriverManager::get_driver_by_name(&self.create_driver)
            .map_err(|e| create_error(e.to_string()))?;

        let (w, h, n) = (options.width, options.height, options.band_count());
        let dataset = match options.pixel_type {
            PixelType::U8 => driver.create_with_band_type::<u8, _>(path, w, h, n),
            PixelType::U16 => driver.create_with_band_type::<u16, _>(path, w, h, n),
            PixelType::I16 => driver.create_with_band_type::<i16, _>(path, w, h, n),
            PixelType::U32 => driver.create_with_band_type::<u32, _>(path, w, h, n),
            PixelType::I32 => driver.create_with_band_type::<i32, _>(path, w, h, n),
        }
        .map_err(|e| create_error(e.to_string()))?;

        for (index, &role) in options.roles.iter().enumerate() {
            let mut band = dataset.rasterband(index + 1)?;
            band.set_color_interpretation(interpretation_of(role))?;
        }
        debug!(path = %path.display(), bands = n, "created raster through GDAL");

        Ok(GdalDataset {
            dataset,
            pixel_type: options.pixel_type,
        })
    }
    /// The dataset must be closed first; GDAL writes its cache on close
    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)?;
        debug!(path = %path.display(), "removed raster");
        Ok(())
    }
}

/// An open GDAL dataset
pub struct GdalDataset {
    dataset: Dataset,
    pixel_type: PixelType,
}

impl RasterDataset for GdalDataset {
    fn size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    fn band_count(&self) -> usize {
        self.dataset.raster_count()
    }

    fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    fn color_role(&self, band: usize) -> Result<ColorRole> {
        let band = self.band_checked(band)?;
        Ok(match band.color_interpretation() {
            ColorInterpretation::RedBand => ColorRole::Red,
            ColorInterpretation::GreenBand => ColorRole::Green,
            ColorInterpretation::BlueBand => ColorRole::Blue,
            ColorInterpretation::AlphaBand => ColorRole::Alpha,
            _ => ColorRole::Undefined,
        })
    }

    fn geo_reference(&self) -> Result<GeoReference> {
        let transform = self
            .dataset
            .geo_transform()
            .map(GeoTransform::from_gdal)
            .unwrap_or_default();

        let projection = self.dataset.projection();
        let crs = if projection.is_empty() {
            None
        } else {
            let crs = CRS::from_wkt(projection);
            match self.dataset.spatial_ref().and_then(|srs| srs.auth_code()) {
                Ok(code) if code > 0 => Some(crs.with_epsg(code as u32)),
                _ => Some(crs),
            }
        };
        Ok(GeoReference::new(transform, crs))
    }

    fn set_geo_reference(&mut self, georef: &GeoReference) -> Result<()> {
        self.dataset.set_geo_transform(&georef.transform.to_gdal())?;
        if let Some(crs) = &georef.crs {
            if let Some(wkt) = crs.wkt() {
                self.dataset.set_projection(wkt)?;
            } else if let Some(code) = crs.epsg() {
                let srs = SpatialRef::from_epsg(code)?;
                self.dataset.set_spatial_ref(&srs)?;
            }
        }
        Ok(())
    }

    fn read_row(&self, band: usize, row: usize, buf: &mut [i32]) -> Result<()> {
        let (cols, _) = self.size();
        if buf.len() != cols {
            return Err(Error::SizeMismatch {
                er: 1,
                ec: cols,
                ar: 1,
                ac: buf.len(),
            });
        }
        let band = self.band_checked(band)?;
        let data = band.read_as::<i32>((0, row as isize), (cols, 1), (cols, 1), None)?;
        buf.copy_from_slice(data.data());
        Ok(())
    }

    fn write_row(&mut self, band: usize, row: usize, samples: &[i32]) -> Result<()> {
        let (cols, _) = self.size();
        if samples.len() != cols {
            return Err(Error::SizeMismatch {
                er: 1,
                ec: cols,
                ar: 1,
                ac: samples.len(),
            });
        }
        let pixel_type = self.pixel_type;
        let row_data: Vec<i32> = samples.iter().map(|&v| pixel_type.saturate(v)).collect();
        let mut buffer = Buffer::new((cols, 1), row_data);
        let mut band = self.band_checked(band)?;
        band.write((0, row as isize), (cols, 1), &mut buffer)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.dataset.flush_cache()?;
        Ok(())
    }
}

impl GdalDataset {
    fn band_checked(&self, band: usize) -> Result<gdal::raster::RasterBand<'_>> {
        let band_count = self.dataset.raster_count();
        if band == 0 || band > band_count {
            return Err(Error::MissingBand { band, band_count });
        }
        Ok(self.dataset.rasterband(band)?)
    }
}

fn pixel_type_of(data_type: GdalDataType) -> Result<PixelType> {
    match data_type {
        GdalDataType::UInt8 => Ok(PixelType::U8),
        GdalDataType::UInt16 => Ok(PixelType::U16),
        GdalDataType::Int16 => Ok(PixelType::I16),
        GdalDataType::UInt32 => Ok(PixelType::U32),
        GdalDataType::Int32 => Ok(PixelType::I32),
        other => Err(Error::UnsupportedDataType(format!("{:?}", other))),
    }
}

fn interpretation_of(role: ColorRole) -> ColorInterpretation {
    match role {
        ColorRole::Red => ColorInterpretation::RedBand,
        ColorRole::Green => ColorInterpretation::GreenBand,
        ColorRole::Blue => ColorInterpretation::BlueBand,
        ColorRole::Alpha => ColorInterpretation::AlphaBand,
        ColorRole::Undefined => ColorInterpretation::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_create_and_reopen_keeps_roles() {
        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        let driver = GdalDriver::default();
        {
            let mut ds = driver
                .create(tmp.path(), &CreateOptions::new(8, 4, PixelType::U8, &ColorRole::RGBA))
                .unwrap();
            ds.write_band(1, &vec![12; 32]).unwrap();
            ds.flush().unwrap();
        }

        let ds = driver.open(tmp.path()).unwrap();
        assert_eq!(ds.size(), (8, 4));
        assert_eq!(ds.color_role(4).unwrap(), ColorRole::Alpha);
        assert_eq!(ds.read_band(1).unwrap(), vec![12; 32]);
    }
}
