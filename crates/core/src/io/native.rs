//! Native GeoTIFF backend (without GDAL dependency)
//!
//! Uses the `tiff` crate. Supports chunky gray, gray+alpha, RGB and RGBA
//! images with integer samples up to 32 bits for reading, and 8/16-bit
//! gray, RGB and RGBA for writing. Georeferencing is carried through the
//! ModelPixelScale/ModelTiepoint (or ModelTransformation) tags and the
//! EPSG entry of the GeoKey directory.
//!
//! Datasets are fully buffered: `open` decodes the whole file and `flush`
//! encodes it again, so memory use grows with width x height x bands even
//! when the caller streams rows. Rasters larger than memory need the
//! `gdal` feature, whose backend reads and writes through GDAL's block
//! cache.

use super::{CreateOptions, RasterDataset, RasterDriver};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{ColorRole, GeoReference, GeoTransform, PixelType, Raster};
use num_traits::NumCast;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{self, ColorType as EncoderColor};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind, TiffValue};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{debug, warn};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;

const GT_MODEL_TYPE_KEY: u32 = 1024;
const GT_RASTER_TYPE_KEY: u32 = 1025;
const GEOGRAPHIC_TYPE_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_KEY: u32 = 3072;
const USER_DEFINED: u32 = 32767;

/// Resolves to the named variant when the `tiff` crate knows the tag
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Driver for GeoTIFF files on the local filesystem.
///
/// Whole images are held in memory between `open`/`create` and `flush`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffDriver;

impl RasterDriver for GeoTiffDriver {
    type Dataset = GeoTiffDataset;

    fn open(&self, path: &Path) -> Result<GeoTiffDataset> {
        let open_error = |reason: String| Error::Open {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| open_error(e.to_string()))?;
        let raster = decode_geotiff(file).map_err(|e| open_error(e.to_string()))?;
        debug!(
            path = %path.display(),
            bands = raster.band_count(),
            rows = raster.rows(),
            cols = raster.cols(),
            "opened GeoTIFF"
        );
        Ok(GeoTiffDataset {
            path: path.to_path_buf(),
            raster,
            sink: None,
            dirty: false,
        })
    }

    fn create(&self, path: &Path, options: &CreateOptions) -> Result<GeoTiffDataset> {
        let create_error = |reason: String| Error::Create {
            path: path.to_path_buf(),
            reason,
        };
        if options.width == 0 || options.height == 0 {
            return Err(create_error(format!(
                "invalid dimensions {}x{}",
                options.width, options.height
            )));
        }
        Layout::of(&options.roles).map_err(|e| create_error(e.to_string()))?;
        if !matches!(options.pixel_type, PixelType::U8 | PixelType::U16) {
            return Err(create_error(format!(
                "pixel type {} cannot be written natively",
                options.pixel_type
            )));
        }

        let file = File::create(path).map_err(|e| create_error(e.to_string()))?;
        let raster = Raster::new(options.height, options.width, options.pixel_type, &options.roles);
        Ok(GeoTiffDataset {
            path: path.to_path_buf(),
            raster,
            sink: Some(file),
            dirty: true,
        })
    }
    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)?;
        debug!(path = %path.display(), "removed GeoTIFF");
        Ok(())
    }
}

/// A GeoTIFF file held in memory.
///
/// Datasets from [`GeoTiffDriver::create`] are writable and re-encode the
/// file on `flush`; a dirty dataset flushes itself when dropped. Datasets
/// from `open` are read-only.
#[derive(Debug)]
pub struct GeoTiffDataset {
    path: PathBuf,
    raster: Raster,
    sink: Option<File>,
    dirty: bool,
}

impl GeoTiffDataset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    fn writable(&mut self) -> Result<&mut Raster> {
        if self.sink.is_none() {
            return Err(Error::Other(format!(
                "{} is open read-only",
                self.path.display()
            )));
        }
        self.dirty = true;
        Ok(&mut self.raster)
    }
}

impl RasterDataset for GeoTiffDataset {
    fn size(&self) -> (usize, usize) {
        RasterDataset::size(&self.raster)
    }

    fn band_count(&self) -> usize {
        self.raster.band_count()
    }

    fn pixel_type(&self) -> PixelType {
        self.raster.pixel_type()
    }

    fn color_role(&self, band: usize) -> Result<ColorRole> {
        self.raster.color_role(band)
    }

    fn geo_reference(&self) -> Result<GeoReference> {
        self.raster.geo_reference()
    }

    fn set_geo_reference(&mut self, georef: &GeoReference) -> Result<()> {
        self.writable()?.set_geo_reference(georef)
    }

    fn read_row(&self, band: usize, row: usize, buf: &mut [i32]) -> Result<()> {
        self.raster.read_row(band, row, buf)
    }

    fn write_row(&mut self, band: usize, row: usize, samples: &[i32]) -> Result<()> {
        self.writable()?.write_row(band, row, samples)
    }

    fn read_band(&self, band: usize) -> Result<Vec<i32>> {
        self.raster.read_band(band)
    }

    fn write_band(&mut self, band: usize, samples: &[i32]) -> Result<()> {
        self.writable()?.write_band(band, samples)
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(file) = self.sink.as_mut() {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            let mut writer = BufWriter::new(&mut *file);
            encode_geotiff(&self.raster, &mut writer)?;
            writer.flush()?;
            drop(writer);
            file.sync_all()?;
            debug!(path = %self.path.display(), "flushed GeoTIFF");
        }
        self.dirty = false;
        Ok(())
    }

    fn discard(&mut self) {
        self.dirty = false;
        self.sink = None;
    }
}

impl Drop for GeoTiffDataset {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), "flush on drop failed: {}", e);
        }
    }
}

/// Band layouts the encoder can express
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Gray,
    Rgb,
    Rgba,
}

impl Layout {
    fn of(roles: &[ColorRole]) -> Result<Self> {
        match roles {
            [ColorRole::Undefined] => Ok(Layout::Gray),
            r if *r == ColorRole::RGB => Ok(Layout::Rgb),
            r if *r == ColorRole::RGBA => Ok(Layout::Rgba),
            other => {
                let names: Vec<&str> = other.iter().map(ColorRole::name).collect();
                Err(Error::UnsupportedDataType(format!(
                    "band layout [{}] has no TIFF photometric equivalent",
                    names.join(", ")
                )))
            }
        }
    }
}

// ─── Decoding ───────────────────────────────────────────────────────────

/// Decode a GeoTIFF from any `Read + Seek` source
pub(crate) fn decode_geotiff<R>(reader: R) -> Result<Raster>
where
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let roles: Vec<ColorRole> = match decoder
        .colortype()
        .map_err(|e| Error::Other(format!("Cannot read color type: {}", e)))?
    {
        ColorType::Gray(_) => vec![ColorRole::Undefined],
        ColorType::GrayA(_) => vec![ColorRole::Undefined, ColorRole::Alpha],
        ColorType::RGB(_) => ColorRole::RGB.to_vec(),
        ColorType::RGBA(_) => ColorRole::RGBA.to_vec(),
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "TIFF color type {:?}",
                other
            )))
        }
    };

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let (pixel_type, samples) = match result {
        DecodingResult::U8(buf) => (PixelType::U8, widen(buf)?),
        DecodingResult::U16(buf) => (PixelType::U16, widen(buf)?),
        DecodingResult::U32(buf) => (PixelType::U32, widen(buf)?),
        DecodingResult::I8(buf) => (PixelType::I16, widen(buf)?),
        DecodingResult::I16(buf) => (PixelType::I16, widen(buf)?),
        DecodingResult::I32(buf) => (PixelType::I32, widen(buf)?),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF sample format".to_string(),
            ))
        }
    };

    let band_count = roles.len();
    if samples.len() != rows * cols * band_count {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    // Chunky layout: samples of one pixel are adjacent
    let mut planes: Vec<Vec<i32>> = vec![Vec::with_capacity(rows * cols); band_count];
    for pixel in samples.chunks_exact(band_count) {
        for (plane, &v) in planes.iter_mut().zip(pixel) {
            plane.push(v);
        }
    }

    let mut raster = Raster::from_bands(
        rows,
        cols,
        pixel_type,
        roles.into_iter().zip(planes).collect(),
    )?;

    let transform = read_geotransform(&mut decoder).unwrap_or_default();
    let crs = read_crs(&mut decoder);
    raster.set_georef(GeoReference::new(transform, crs));

    Ok(raster)
}

fn widen<T: NumCast + Copy>(buf: Vec<T>) -> Result<Vec<i32>> {
    buf.into_iter()
        .map(|v| {
            num_traits::cast::<T, i32>(v).ok_or_else(|| {
                Error::UnsupportedDataType("sample does not fit in 32-bit signed range".to_string())
            })
        })
        .collect()
}

/// Read the affine transform from the model tags
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(geo_tag(MODEL_TRANSFORMATION)) {
        if m.len() >= 8 {
            return Ok(GeoTransform {
                origin_x: m[3],
                pixel_width: m[0],
                row_rotation: m[1],
                origin_y: m[7],
                col_rotation: m[4],
                pixel_height: m[5],
            });
        }
    }

    let scale = decoder
        .get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;
    let tiepoint = decoder
        .get_tag_f64_vec(geo_tag(MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// EPSG code from the GeoKey directory, if one is declared inline
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u32_vec(geo_tag(GEO_KEY_DIRECTORY)).ok()?;
    // Header: [version, revision, minor, key count], then 4 values per key
    keys.get(4..)?
        .chunks_exact(4)
        .filter(|entry| entry[1] == 0)
        .find(|entry| entry[0] == PROJECTED_CS_TYPE_KEY || entry[0] == GEOGRAPHIC_TYPE_KEY)
        .map(|entry| entry[3])
        .filter(|&code| code != USER_DEFINED)
        .map(CRS::from_epsg)
}

// ─── Encoding ───────────────────────────────────────────────────────────

/// Encode a raster as GeoTIFF into any `Write + Seek` sink
pub(crate) fn encode_geotiff<W>(raster: &Raster, writer: W) -> Result<()>
where
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let layout = Layout::of(&raster.roles())?;
    match (layout, raster.pixel_type()) {
        (Layout::Gray, PixelType::U8) => {
            write_image::<colortype::Gray8, _, _>(&mut encoder, raster, &interleave(raster)?)
        }
        (Layout::Gray, PixelType::U16) => {
            write_image::<colortype::Gray16, _, _>(&mut encoder, raster, &interleave(raster)?)
        }
        (Layout::Rgb, PixelType::U8) => {
            write_image::<colortype::RGB8, _, _>(&mut encoder, raster, &interleave(raster)?)
        }
        (Layout::Rgb, PixelType::U16) => {
            write_image::<colortype::RGB16, _, _>(&mut encoder, raster, &interleave(raster)?)
        }
        (Layout::Rgba, PixelType::U8) => {
            write_image::<colortype::RGBA8, _, _>(&mut encoder, raster, &interleave(raster)?)
        }
        (Layout::Rgba, PixelType::U16) => {
            write_image::<colortype::RGBA16, _, _>(&mut encoder, raster, &interleave(raster)?)
        }
        (_, other) => Err(Error::UnsupportedDataType(format!(
            "pixel type {} cannot be written natively",
            other
        ))),
    }
}

fn write_image<C, W, K>(
    encoder: &mut TiffEncoder<W, K>,
    raster: &Raster,
    data: &[C::Inner],
) -> Result<()>
where
    C: EncoderColor,
    W: Write + Seek,
    K: TiffKind,
    [C::Inner]: TiffValue,
{
    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    write_geotags(image.encoder(), raster.georef())?;

    image
        .write_data(data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    Ok(())
}

/// Pixel-interleaved samples of all bands, cast to the storage type
fn interleave<T: NumCast>(raster: &Raster) -> Result<Vec<T>> {
    let bands = (1..=raster.band_count())
        .map(|b| raster.band(b).map(|band| band.data()))
        .collect::<Result<Vec<_>>>()?;

    let (rows, cols) = raster.shape();
    let mut out = Vec::with_capacity(rows * cols * bands.len());
    for row in 0..rows {
        for col in 0..cols {
            for band in &bands {
                let v = band[(row, col)];
                out.push(num_traits::cast(v).ok_or_else(|| {
                    Error::UnsupportedDataType(format!("sample {} out of storage range", v))
                })?);
            }
        }
    }
    Ok(out)
}

fn write_geotags<W, K>(dir: &mut DirectoryEncoder<'_, W, K>, georef: &GeoReference) -> Result<()>
where
    W: Write + Seek,
    K: TiffKind,
{
    let tag_error = |e: tiff::TiffError| Error::Other(format!("Cannot write geo tag: {}", e));
    let gt = &georef.transform;

    if gt.is_axis_aligned() {
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        dir.write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])
            .map_err(tag_error)?;
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        dir.write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])
            .map_err(tag_error)?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(geo_tag(MODEL_TRANSFORMATION), &matrix[..])
            .map_err(tag_error)?;
    }

    let keys = geokeys(georef.crs.as_ref());
    dir.write_tag(geo_tag(GEO_KEY_DIRECTORY), &keys[..])
        .map_err(tag_error)?;
    Ok(())
}

/// GeoKey directory: model type, raster type and, when known, the EPSG code
fn geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let geographic = crs.is_some_and(CRS::is_geographic);
    let model_type: u16 = if geographic { 2 } else { 1 };

    let epsg = crs.and_then(|c| {
        if c.epsg().is_none() && c.wkt().is_some() {
            debug!("WKT-only CRS is not representable in native GeoKeys; omitted");
        }
        c.epsg().and_then(|code| u16::try_from(code).ok())
    });

    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_KEY as u16, 0, 1, model_type],
        [GT_RASTER_TYPE_KEY as u16, 0, 1, 1], // RasterPixelIsArea
    ];
    if let Some(code) = epsg {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        entries.push([key as u16, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn sample_rgba() -> Raster {
        let n = 4 * 3;
        let band = |base: i32| (0..n).map(|i| base + i as i32).collect::<Vec<_>>();
        let mut raster = Raster::from_bands(
            3,
            4,
            PixelType::U8,
            vec![
                (ColorRole::Red, band(0)),
                (ColorRole::Green, band(50)),
                (ColorRole::Blue, band(100)),
                (ColorRole::Alpha, vec![255; n]),
            ],
        )
        .unwrap();
        raster.set_georef(GeoReference::new(
            GeoTransform::new(500_000.0, 9_000_000.0, 10.0, -10.0),
            Some(CRS::from_epsg(31984)),
        ));
        raster
    }

    fn roundtrip(raster: &Raster) -> Raster {
        let mut buf = Vec::new();
        encode_geotiff(raster, Cursor::new(&mut buf)).unwrap();
        decode_geotiff(Cursor::new(buf)).unwrap()
    }

    #[test]
    fn test_rgba_roundtrip_keeps_samples_and_roles() {
        let raster = sample_rgba();
        let loaded = roundtrip(&raster);

        assert_eq!(loaded.shape(), (3, 4));
        assert_eq!(loaded.roles(), ColorRole::RGBA.to_vec());
        for band in 1..=4 {
            assert_eq!(
                loaded.band_samples(band).unwrap(),
                raster.band_samples(band).unwrap()
            );
        }
    }

    #[test]
    fn test_georeference_roundtrip() {
        let loaded = roundtrip(&sample_rgba());
        let gt = loaded.georef().transform;

        assert_relative_eq!(gt.origin_x, 500_000.0, epsilon = 1e-9);
        assert_relative_eq!(gt.origin_y, 9_000_000.0, epsilon = 1e-9);
        assert_relative_eq!(gt.pixel_width, 10.0, epsilon = 1e-9);
        assert_relative_eq!(gt.pixel_height, -10.0, epsilon = 1e-9);
        assert_eq!(loaded.georef().crs.as_ref().and_then(CRS::epsg), Some(31984));
    }

    #[test]
    fn test_gray16_roundtrip() {
        let raster = Raster::from_bands(
            2,
            2,
            PixelType::U16,
            vec![(ColorRole::Undefined, vec![0, 1000, 40_000, 65_535])],
        )
        .unwrap();
        let loaded = roundtrip(&raster);

        assert_eq!(loaded.pixel_type(), PixelType::U16);
        assert_eq!(loaded.band_samples(1).unwrap(), vec![0, 1000, 40_000, 65_535]);
    }

    #[test]
    fn test_geokeys_geographic() {
        let keys = geokeys(Some(&CRS::from_epsg(4326)));
        assert_eq!(keys, vec![1, 1, 0, 3, 1024, 0, 1, 2, 1025, 0, 1, 1, 2048, 0, 1, 4326]);
    }

    #[test]
    fn test_unsupported_layout() {
        let raster = Raster::new(2, 2, PixelType::U8, &[ColorRole::Red, ColorRole::Green]);
        let mut buf = Vec::new();
        assert!(matches!(
            encode_geotiff(&raster, Cursor::new(&mut buf)),
            Err(Error::UnsupportedDataType(_))
        ));
    }

    #[test]
    fn test_driver_file_roundtrip() {
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        let options = CreateOptions::new(4, 3, PixelType::U8, &ColorRole::RGB);
        {
            let mut ds = GeoTiffDriver.create(tmp.path(), &options).unwrap();
            for band in 1..=3 {
                ds.write_band(band, &vec![band as i32 * 10; 12]).unwrap();
            }
            ds.flush().unwrap();
        }

        let ds = GeoTiffDriver.open(tmp.path()).unwrap();
        assert_eq!(ds.size(), (4, 3));
        assert_eq!(ds.color_role(2).unwrap(), ColorRole::Green);
        assert_eq!(ds.read_band(3).unwrap(), vec![30; 12]);
    }

    #[test]
    fn test_opened_dataset_is_read_only() {
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        {
            let options = CreateOptions::new(2, 2, PixelType::U8, &[ColorRole::Undefined]);
            let mut ds = GeoTiffDriver.create(tmp.path(), &options).unwrap();
            ds.flush().unwrap();
        }
        let mut ds = GeoTiffDriver.open(tmp.path()).unwrap();
        assert!(ds.write_row(1, 0, &[1, 2]).is_err());
    }

    #[test]
    fn test_create_rejects_wide_pixel_types() {
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        let options = CreateOptions::new(2, 2, PixelType::I32, &ColorRole::RGB);
        assert!(matches!(
            GeoTiffDriver.create(tmp.path(), &options),
            Err(Error::Create { .. })
        ));
    }

    #[test]
    fn test_discard_leaves_file_empty() {
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        {
            let options = CreateOptions::new(2, 2, PixelType::U8, &ColorRole::RGB);
            let mut ds = GeoTiffDriver.create(tmp.path(), &options).unwrap();
            ds.write_band(1, &[1, 2, 3, 4]).unwrap();
            ds.discard();
            assert!(ds.write_band(1, &[1, 2, 3, 4]).is_err());
        }
        assert_eq!(std::fs::metadata(tmp.path()).unwrap().len(), 0);

        GeoTiffDriver.remove(tmp.path()).unwrap();
        assert!(!tmp.path().exists());
    }
}
