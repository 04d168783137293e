//! Locate bands by declared color role
//!
//! Producers do not agree on band order, so red/green/blue/alpha are
//! found through each band's declared role rather than a fixed index.

use geobalance_core::{ColorRole, Error, RasterDataset, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What to do when no band declares the requested role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BandFallback {
    /// Take the last band when it lies past the three conventional color
    /// positions (a fourth band carrying an undeclared alpha channel is
    /// the common case). Rasters of three bands or fewer never fall back.
    #[default]
    LastBand,
    /// Only accept a declared match
    Strict,
}

/// How a band was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The band declares the requested role
    Declared,
    /// Picked by the positional fallback
    Fallback,
}

/// A located band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandMatch {
    /// 1-based band index
    pub index: usize,
    pub resolution: Resolution,
}

/// Number of leading band positions conventionally holding color channels
const COLOR_POSITIONS: usize = 3;

/// Find the first band declaring `role`.
///
/// Bands are searched in order 1..=N. When none matches, `fallback`
/// decides whether the last band stands in; see [`BandFallback`].
///
/// # Errors
/// [`Error::BandNotFound`] when the raster has no bands, or when nothing
/// matches and no fallback applies.
pub fn locate_band<D>(dataset: &D, role: ColorRole, fallback: BandFallback) -> Result<BandMatch>
where
    D: RasterDataset + ?Sized,
{
    let band_count = dataset.band_count();

    for index in 1..=band_count {
        if dataset.color_role(index)? == role {
            debug!(%role, band = index, "band located by declared role");
            return Ok(BandMatch {
                index,
                resolution: Resolution::Declared,
            });
        }
    }

    match fallback {
        BandFallback::LastBand if band_count > COLOR_POSITIONS => {
            warn!(
                %role,
                band = band_count,
                "no band declares the role; falling back to the last band"
            );
            Ok(BandMatch {
                index: band_count,
                resolution: Resolution::Fallback,
            })
        }
        _ => Err(Error::BandNotFound { role, band_count }),
    }
}

/// Locate several roles at once, in the order given.
///
/// Fails fast: the first role that cannot be resolved aborts with
/// [`Error::MissingBand`], naming the position that would have held it.
pub fn locate_bands<D>(
    dataset: &D,
    roles: &[ColorRole],
    fallback: BandFallback,
) -> Result<Vec<BandMatch>>
where
    D: RasterDataset + ?Sized,
{
    roles
        .iter()
        .enumerate()
        .map(|(position, &role)| {
            locate_band(dataset, role, fallback).map_err(|e| match e {
                Error::BandNotFound { band_count, .. } => Error::MissingBand {
                    band: position + 1,
                    band_count,
                },
                other => other,
            })
        })
        .collect()
}
