//! Persistent storage for uploaded range masks.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{PackedMask, PixelGrid, RasterError, Result};

/// Destination for packed range masks, addressed by asset identifier.
///
/// Identifiers are slash-separated paths such as `ranges/run-1/22694927_1`.
pub trait RasterStore: Send + Sync {
    /// Store a mask under `asset_id`, replacing any previous one.
    ///
    /// Returns the number of bytes written.
    fn put_mask(&self, asset_id: &str, mask: &PackedMask) -> Result<u64>;

    /// Load the mask stored under `asset_id`.
    fn get_mask(&self, asset_id: &str) -> Result<PackedMask>;

    /// Whether a mask is stored under `asset_id`.
    fn contains(&self, asset_id: &str) -> Result<bool>;
}

/// A [`RasterStore`] backed by a local directory.
///
/// Each asset becomes two files: `<id>.mask` with the packed bits and
/// `<id>.json` with the grid it covers.
#[derive(Debug, Clone)]
pub struct DirectoryRasterStore {
    root: PathBuf,
}

impl DirectoryRasterStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, asset_id: &str, extension: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for part in asset_id.split('/').filter(|p| !p.is_empty()) {
            if part == "." || part == ".." {
                return Err(RasterError::AssetNotFound(asset_id.to_string()));
            }
            path.push(part);
        }
        if path == self.root {
            return Err(RasterError::AssetNotFound(asset_id.to_string()));
        }
        path.set_extension(extension);
        Ok(path)
    }
}

impl RasterStore for DirectoryRasterStore {
    fn put_mask(&self, asset_id: &str, mask: &PackedMask) -> Result<u64> {
        let mask_path = self.path_for(asset_id, "mask")?;
        let grid_path = self.path_for(asset_id, "json")?;
        if let Some(parent) = mask_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = mask.to_bytes();
        fs::write(&mask_path, &bytes)?;
        fs::write(&grid_path, serde_json::to_vec_pretty(mask.grid())?)?;

        debug!(asset_id, bytes = bytes.len(), "stored range mask");
        Ok(bytes.len() as u64)
    }

    fn get_mask(&self, asset_id: &str) -> Result<PackedMask> {
        let mask_path = self.path_for(asset_id, "mask")?;
        let grid_path = self.path_for(asset_id, "json")?;
        if !mask_path.exists() || !grid_path.exists() {
            return Err(RasterError::AssetNotFound(asset_id.to_string()));
        }

        let grid: PixelGrid = serde_json::from_slice(&fs::read(&grid_path)?)?;
        PackedMask::from_bytes(grid, &fs::read(&mask_path)?)
    }

    fn contains(&self, asset_id: &str) -> Result<bool> {
        Ok(self.path_for(asset_id, "mask")?.exists())
    }
}
