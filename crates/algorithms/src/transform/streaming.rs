//! Row-by-row pixel transforms
//!
//! Reads one scanline from every input band, hands the samples of each
//! column to a pixel function, and writes the results to the matching
//! output bands. Memory use is one row per band, so rasters larger than
//! memory can be processed.

use crate::cancel::CancelToken;
use geobalance_core::{Error, RasterDataset, Result};
use tracing::debug;

/// Pixel function leaving samples unchanged
pub fn identity(_pixel: &mut [i32]) {}

/// Pixel function adding `delta` to every sample of a pixel
pub fn offset(delta: i32) -> impl FnMut(&mut [i32]) + Clone {
    move |pixel: &mut [i32]| {
        for v in pixel.iter_mut() {
            *v = v.saturating_add(delta);
        }
    }
}

/// Stream `src_bands` of `src` through `f` into `dst_bands` of `dst`.
///
/// For every row, ascending, and every column, `f` receives the samples
/// of that pixel in `src_bands` order and rewrites them in place; sample
/// `i` is then written to `dst_bands[i]`. Band indices are 1-based.
///
/// Everything is validated before the first row is read. On a mid-stream
/// failure (I/O error or cancellation) `dst` holds a partial result and
/// should be discarded.
///
/// # Errors
/// - [`Error::MissingBand`] when a listed band does not exist
/// - [`Error::InvalidParameter`] when the two band lists differ in length
/// - [`Error::SizeMismatch`] when the rasters differ in dimensions
/// - [`Error::Cancelled`] when `cancel` fires between rows
pub fn stream_transform<S, D, F>(
    src: &S,
    src_bands: &[usize],
    dst: &mut D,
    dst_bands: &[usize],
    mut f: F,
    cancel: &CancelToken,
) -> Result<()>
where
    S: RasterDataset + ?Sized,
    D: RasterDataset + ?Sized,
    F: FnMut(&mut [i32]),
{
    check_bands(src, src_bands)?;
    check_bands(dst, dst_bands)?;
    if src_bands.len() != dst_bands.len() {
        return Err(Error::InvalidParameter {
            name: "dst_bands",
            value: format!("{:?}", dst_bands),
            reason: format!("{} source band(s) need as many destinations", src_bands.len()),
        });
    }

    let (cols, rows) = src.size();
    let (dst_cols, dst_rows) = dst.size();
    if (cols, rows) != (dst_cols, dst_rows) {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: dst_rows,
            ac: dst_cols,
        });
    }

    let n = src_bands.len();
    debug!(bands = n, rows, cols, "streaming transform");

    let mut lines: Vec<Vec<i32>> = vec![vec![0; cols]; n];
    let mut pixel = vec![0; n];

    for row in 0..rows {
        cancel.check()?;

        for (line, &band) in lines.iter_mut().zip(src_bands) {
            src.read_row(band, row, line)?;
        }

        for col in 0..cols {
            for (p, line) in pixel.iter_mut().zip(&lines) {
                *p = line[col];
            }
            f(&mut pixel);
            for (line, &p) in lines.iter_mut().zip(&pixel) {
                line[col] = p;
            }
        }

        for (line, &band) in lines.iter().zip(dst_bands) {
            dst.write_row(band, row, line)?;
        }
    }

    Ok(())
}

fn check_bands<D: RasterDataset + ?Sized>(dataset: &D, bands: &[usize]) -> Result<()> {
    let band_count = dataset.band_count();
    if bands.is_empty() {
        return Err(Error::MissingBand { band: 1, band_count });
    }
    match bands.iter().find(|&&b| b == 0 || b > band_count) {
        Some(&band) => Err(Error::MissingBand { band, band_count }),
        None => Ok(()),
    }
}
