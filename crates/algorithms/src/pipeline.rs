//! End-to-end workflows
//!
//! Each workflow locates the color bands of the source, relays its
//! geo-reference to the destination and runs one of the band operations.
//! The `*_file` variants also open, create and flush through a
//! [`RasterDriver`].

use crate::bands::{locate_bands, BandFallback, BandMatch};
use crate::cancel::CancelToken;
use crate::stretch::{stretch_band, PercentileStretchParams};
use crate::transform::stream_transform;
use geobalance_core::{
    copy_geo_reference, ColorRole, CreateOptions, PixelType, RasterDataset, RasterDriver, Result,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Stream the red, green, blue and alpha bands of `src` through `f` into
/// bands 1..=4 of `dst`.
///
/// Returns the located source bands in RGBA order.
pub fn rewrite_rgba<S, D, F>(
    src: &S,
    dst: &mut D,
    f: F,
    fallback: BandFallback,
    cancel: &CancelToken,
) -> Result<Vec<BandMatch>>
where
    S: RasterDataset + ?Sized,
    D: RasterDataset + ?Sized,
    F: FnMut(&mut [i32]),
{
    let matches = locate_bands(src, &ColorRole::RGBA, fallback)?;
    rewrite_located(src, &matches, dst, f, cancel)?;
    Ok(matches)
}

fn rewrite_located<S, D, F>(
    src: &S,
    matches: &[BandMatch],
    dst: &mut D,
    f: F,
    cancel: &CancelToken,
) -> Result<()>
where
    S: RasterDataset + ?Sized,
    D: RasterDataset + ?Sized,
    F: FnMut(&mut [i32]),
{
    let src_bands: Vec<usize> = matches.iter().map(|m| m.index).collect();
    let dst_bands: Vec<usize> = (1..=src_bands.len()).collect();

    copy_geo_reference(src, dst)?;
    stream_transform(src, &src_bands, dst, &dst_bands, f, cancel)?;

    let (cols, rows) = src.size();
    info!(?src_bands, rows, cols, "rewrote RGBA bands");
    Ok(())
}

/// Percentile-stretch the red, green and blue bands of `src` into the
/// bands of `dst` declaring the same roles.
///
/// Bands are processed one at a time; cancellation is honored between
/// bands. Returns the located source bands in RGB order.
pub fn white_balance<S, D>(
    src: &S,
    dst: &mut D,
    params: &PercentileStretchParams,
    fallback: BandFallback,
    cancel: &CancelToken,
) -> Result<Vec<BandMatch>>
where
    S: RasterDataset + ?Sized,
    D: RasterDataset + ?Sized,
{
    params.validate()?;
    let matches = locate_bands(src, &ColorRole::RGB, fallback)?;
    balance_located(src, &matches, dst, params, cancel)?;
    Ok(matches)
}

fn balance_located<S, D>(
    src: &S,
    matches: &[BandMatch],
    dst: &mut D,
    params: &PercentileStretchParams,
    cancel: &CancelToken,
) -> Result<()>
where
    S: RasterDataset + ?Sized,
    D: RasterDataset + ?Sized,
{
    let targets = locate_bands(dst, &ColorRole::RGB, BandFallback::Strict)?;

    copy_geo_reference(src, dst)?;

    for ((role, source), target) in ColorRole::RGB.iter().zip(matches).zip(&targets) {
        cancel.check()?;

        let samples = src.read_band(source.index)?;
        let stretched = stretch_band(&samples, params)?;
        let out: Vec<i32> = stretched.into_iter().map(i32::from).collect();
        dst.write_band(target.index, &out)?;

        debug!(%role, from = source.index, to = target.index, "band stretched");
    }

    info!(percent = params.percent, "white balance applied");
    Ok(())
}

/// [`rewrite_rgba`] from `input` to a new four-band RGBA raster at
/// `output` with the source pixel type.
///
/// Bands are located before the output is created, so a source lacking
/// a color band leaves no file behind. An output abandoned by a later
/// failure is discarded and removed.
pub fn rewrite_file<Dr, F>(
    driver: &Dr,
    input: &Path,
    output: &Path,
    f: F,
    fallback: BandFallback,
    cancel: &CancelToken,
) -> Result<Vec<BandMatch>>
where
    Dr: RasterDriver,
    F: FnMut(&mut [i32]),
{
    let src = driver.open(input)?;
    let matches = locate_bands(&src, &ColorRole::RGBA, fallback)?;

    let (cols, rows) = src.size();
    let options = CreateOptions::new(cols, rows, src.pixel_type(), &ColorRole::RGBA);
    let dst = driver.create(output, &options)?;

    finish_or_remove(driver, output, dst, |dst| {
        rewrite_located(&src, &matches, dst, f, cancel)
    })?;
    Ok(matches)
}

/// [`white_balance`] from `input` to a new three-band 8-bit RGB raster
/// at `output`.
///
/// On failure, including a flat band under [`FlatBandPolicy::Fail`], no
/// output is left behind.
///
/// [`FlatBandPolicy::Fail`]: crate::stretch::FlatBandPolicy::Fail
pub fn white_balance_file<Dr>(
    driver: &Dr,
    input: &Path,
    output: &Path,
    params: &PercentileStretchParams,
    fallback: BandFallback,
    cancel: &CancelToken,
) -> Result<Vec<BandMatch>>
where
    Dr: RasterDriver,
{
    params.validate()?;
    let src = driver.open(input)?;
    let matches = locate_bands(&src, &ColorRole::RGB, fallback)?;

    let (cols, rows) = src.size();
    let options = CreateOptions::new(cols, rows, PixelType::U8, &ColorRole::RGB);
    let dst = driver.create(output, &options)?;

    finish_or_remove(driver, output, dst, |dst| {
        balance_located(&src, &matches, dst, params, cancel)
    })?;
    Ok(matches)
}

/// Run `job` on a freshly created output and flush it. When either step
/// fails the output is discarded and removed, and the job's error returned.
fn finish_or_remove<Dr, J>(driver: &Dr, output: &Path, mut dst: Dr::Dataset, job: J) -> Result<()>
where
    Dr: RasterDriver,
    J: FnOnce(&mut Dr::Dataset) -> Result<()>,
{
    let outcome = job(&mut dst).and_then(|()| dst.flush());
    if let Err(e) = outcome {
        dst.discard();
        drop(dst);
        if let Err(remove_err) = driver.remove(output) {
            warn!(path = %output.display(), "cannot remove partial output: {}", remove_err);
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::Resolution;
    use crate::transform::{identity, offset};
    use geobalance_core::io::MemDriver;
    use geobalance_core::{Error, GeoReference, GeoTransform, Raster, CRS};

    fn georef() -> GeoReference {
        GeoReference::new(
            GeoTransform::new(500_000.0, 7_200_000.0, 10.0, -10.0),
            Some(CRS::from_epsg(31984)),
        )
    }

    /// 4x5 raster with bands in BGRA order and distinct ramps per band
    fn bgra_source() -> Raster {
        let n = 20;
        let ramp = |start: i32, step: i32| (0..n).map(|i| start + i * step).collect::<Vec<_>>();
        let mut raster = Raster::from_bands(
            4,
            5,
            PixelType::U8,
            vec![
                (ColorRole::Blue, ramp(100, 2)),
                (ColorRole::Green, ramp(50, 3)),
                (ColorRole::Red, ramp(0, 10)),
                (ColorRole::Alpha, vec![255; 20]),
            ],
        )
        .unwrap();
        raster.set_georef(georef());
        raster
    }

    #[test]
    fn test_rewrite_reorders_to_rgba() {
        let src = bgra_source();
        let mut dst = Raster::new(4, 5, PixelType::U8, &ColorRole::RGBA);

        let matches = rewrite_rgba(&src, &mut dst, identity, BandFallback::LastBand, &CancelToken::new())
            .unwrap();

        let indices: Vec<usize> = matches.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![3, 2, 1, 4]);
        assert_eq!(dst.band_samples(1).unwrap(), src.band_samples(3).unwrap());
        assert_eq!(dst.band_samples(3).unwrap(), src.band_samples(1).unwrap());
        assert_eq!(dst.georef(), src.georef());
    }

    #[test]
    fn test_rewrite_offset_saturates_alpha() {
        let src = bgra_source();
        let mut dst = Raster::new(4, 5, PixelType::U8, &ColorRole::RGBA);

        rewrite_rgba(&src, &mut dst, offset(1), BandFallback::LastBand, &CancelToken::new()).unwrap();

        assert_eq!(dst.get(1, 0, 0).unwrap(), 1);
        assert_eq!(dst.get(1, 1, 0).unwrap(), 51);
        // 255 + 1 does not fit a byte
        assert_eq!(dst.get(4, 2, 3).unwrap(), 255);
    }

    #[test]
    fn test_rewrite_alpha_falls_back_to_band_four() {
        let mut src = bgra_source();
        src.set_role(4, ColorRole::Undefined).unwrap();
        let mut dst = Raster::new(4, 5, PixelType::U8, &ColorRole::RGBA);

        let matches =
            rewrite_rgba(&src, &mut dst, identity, BandFallback::LastBand, &CancelToken::new()).unwrap();
        assert_eq!(matches[3].index, 4);
        assert_eq!(matches[3].resolution, Resolution::Fallback);

        let mut dst = Raster::new(4, 5, PixelType::U8, &ColorRole::RGBA);
        let strict = rewrite_rgba(&src, &mut dst, identity, BandFallback::Strict, &CancelToken::new());
        assert!(matches!(strict, Err(Error::MissingBand { band: 4, .. })));
    }

    #[test]
    fn test_white_balance_stretches_each_band() {
        let src = bgra_source();
        let mut dst = Raster::new(4, 5, PixelType::U8, &ColorRole::RGB);
        let params = PercentileStretchParams::new(10.0);

        white_balance(&src, &mut dst, &params, BandFallback::LastBand, &CancelToken::new()).unwrap();

        for band in 1..=3 {
            let samples = dst.band_samples(band).unwrap();
            assert_eq!(samples[0], 0, "band {band} low end");
            assert_eq!(samples[19], 255, "band {band} high end");
        }
        assert_eq!(dst.georef(), src.georef());
    }

    #[test]
    fn test_white_balance_honors_cancel() {
        let src = bgra_source();
        let mut dst = Raster::new(4, 5, PixelType::U8, &ColorRole::RGB);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = white_balance(&src, &mut dst, &PercentileStretchParams::default(), BandFallback::LastBand, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_white_balance_file_through_driver() {
        let driver = MemDriver::new();
        driver.insert("in.tif", bgra_source());

        white_balance_file(
            &driver,
            Path::new("in.tif"),
            Path::new("out.tif"),
            &PercentileStretchParams::new(5.0),
            BandFallback::LastBand,
            &CancelToken::new(),
        )
        .unwrap();

        let out = driver.get("out.tif").unwrap();
        assert_eq!(out.band_count(), 3);
        assert_eq!(out.pixel_type(), PixelType::U8);
        assert_eq!(out.roles(), ColorRole::RGB.to_vec());
        assert_eq!(out.georef(), &georef());
    }

    #[test]
    fn test_rewrite_file_missing_band_creates_nothing() {
        let driver = MemDriver::new();
        let gray = Raster::new(2, 2, PixelType::U16, &[ColorRole::Undefined]);
        driver.insert("gray.tif", gray);

        let result = rewrite_file(
            &driver,
            Path::new("gray.tif"),
            Path::new("out.tif"),
            identity,
            BandFallback::LastBand,
            &CancelToken::new(),
        );

        assert!(matches!(result, Err(Error::MissingBand { band: 1, band_count: 1 })));
        assert!(driver.get("out.tif").is_none());
    }

    #[test]
    fn test_white_balance_rejects_percent_before_writing() {
        let src = bgra_source();
        let mut dst = Raster::new(4, 5, PixelType::U8, &ColorRole::RGB);

        let result = white_balance(&src, &mut dst, &PercentileStretchParams::new(60.0), BandFallback::LastBand, &CancelToken::new());

        assert!(matches!(result, Err(Error::InvalidParameter { name: "percent", .. })));
        assert_eq!(dst.georef(), &GeoReference::default());
    }

    #[test]
    fn test_white_balance_file_flat_band_leaves_no_output() {
        let driver = MemDriver::new();
        let mut src = bgra_source();
        // green flat, red still stretchable
        src.set_band_samples(2, &[7; 20]).unwrap();
        driver.insert("in.tif", src);

        let result = white_balance_file(
            &driver,
            Path::new("in.tif"),
            Path::new("out.tif"),
            &PercentileStretchParams::default(),
            BandFallback::LastBand,
            &CancelToken::new(),
        );

        assert!(matches!(result, Err(Error::DegenerateDistribution { .. })));
        assert!(driver.get("out.tif").is_none());
    }

    #[test]
    fn test_rewrite_file_keeps_pixel_type() {
        let driver = MemDriver::new();
        let src = Raster::from_bands(
            1,
            3,
            PixelType::U16,
            vec![
                (ColorRole::Red, vec![1000, 2000, 65535]),
                (ColorRole::Green, vec![1, 2, 3]),
                (ColorRole::Blue, vec![4, 5, 6]),
                (ColorRole::Alpha, vec![0, 0, 0]),
            ],
        )
        .unwrap();
        driver.insert("in.tif", src);

        rewrite_file(
            &driver,
            Path::new("in.tif"),
            Path::new("out.tif"),
            offset(1),
            BandFallback::Strict,
            &CancelToken::new(),
        )
        .unwrap();

        let out = driver.get("out.tif").unwrap();
        assert_eq!(out.pixel_type(), PixelType::U16);
        assert_eq!(out.band_samples(1).unwrap(), vec![1001, 2001, 65535]);
        assert_eq!(out.band_samples(4).unwrap(), vec![1, 1, 1]);
    }
}
