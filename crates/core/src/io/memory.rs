//! In-memory driver
//!
//! Datasets live in a store shared by all clones of a [`MemDriver`]. Writes
//! to a dataset become visible to later `open` calls only once flushed.

use super::{CreateOptions, RasterDataset, RasterDriver};
use crate::error::{Error, Result};
use crate::raster::{ColorRole, GeoReference, PixelType, Raster};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

type Store = Arc<Mutex<HashMap<PathBuf, Raster>>>;

/// Driver keeping rasters in memory, keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemDriver {
    store: Store,
}

impl MemDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raster under `path`, replacing any previous one
    pub fn insert(&self, path: impl Into<PathBuf>, raster: Raster) {
        lock(&self.store).insert(path.into(), raster);
    }

    /// Snapshot of the raster last flushed under `path`
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Raster> {
        lock(&self.store).get(path.as_ref()).cloned()
    }
}

fn lock(store: &Store) -> MutexGuard<'_, HashMap<PathBuf, Raster>> {
    // A poisoned map still holds complete rasters; writers replace whole entries.
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RasterDriver for MemDriver {
    type Dataset = MemDataset;

    fn open(&self, path: &Path) -> Result<MemDataset> {
        let raster = self.get(path).ok_or_else(|| Error::Open {
            path: path.to_path_buf(),
            reason: "no such raster".to_string(),
        })?;
        Ok(MemDataset {
            path: path.to_path_buf(),
            raster,
            store: Arc::clone(&self.store),
            dirty: false,
        })
    }

    fn create(&self, path: &Path, options: &CreateOptions) -> Result<MemDataset> {
        if options.width == 0 || options.height == 0 || options.roles.is_empty() {
            return Err(Error::Create {
                path: path.to_path_buf(),
                reason: format!(
                    "{}x{} raster with {} band(s)",
                    options.width,
                    options.height,
                    options.band_count()
                ),
            });
        }
        debug!(path = %path.display(), bands = options.band_count(), "creating in-memory raster");
        let raster = Raster::new(options.height, options.width, options.pixel_type, &options.roles);
        Ok(MemDataset {
            path: path.to_path_buf(),
            raster,
            store: Arc::clone(&self.store),
            dirty: true,
        })
    }

    fn remove(&self, path: &Path) -> Result<()> {
        lock(&self.store).remove(path);
        Ok(())
    }
}

/// Handle on a raster owned by a [`MemDriver`]
#[derive(Debug)]
pub struct MemDataset {
    path: PathBuf,
    raster: Raster,
    store: Store,
    dirty: bool,
}

impl MemDataset {
    /// The working copy, including unflushed writes
    pub fn raster(&self) -> &Raster {
        &self.raster
    }
}

impl RasterDataset for MemDataset {
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
        self.dirty = true;
        self.raster.set_geo_reference(georef)
    }

    fn read_row(&self, band: usize, row: usize, buf: &mut [i32]) -> Result<()> {
        self.raster.read_row(band, row, buf)
    }

    fn write_row(&mut self, band: usize, row: usize, samples: &[i32]) -> Result<()> {
        self.dirty = true;
        self.raster.write_row(band, row, samples)
    }

    fn read_band(&self, band: usize) -> Result<Vec<i32>> {
        self.raster.read_band(band)
    }

    fn write_band(&mut self, band: usize, samples: &[i32]) -> Result<()> {
        self.dirty = true;
        self.raster.write_band(band, samples)
    }

    fn flush(&mut self) -> Result<()> {
        if self.dirty {
            lock(&self.store).insert(self.path.clone(), self.raster.clone());
            self.dirty = false;
        }
        Ok(())
    }

    fn discard(&mut self) {
        self.dirty = false;
    }
}

impl Drop for MemDataset {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), "flush on drop failed: {}", e);
        }
    }
}
