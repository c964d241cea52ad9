//! Typed hand-off between the rasterizer and the orchestrator.

use serde::{Deserialize, Serialize};

use crate::SpeciesKey;

/// One uploaded composite-range mask.
///
/// The rasterizer returns a list of these in upload order. The orchestrator
/// submits one area job per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterAsset {
    /// Composite range the mask was rasterized from.
    pub key: SpeciesKey,
    /// Scientific name, used to look up altitude limits and generation length.
    pub sci_name: String,
    /// Identifier of the mask in the raster store.
    pub asset_id: String,
}

impl RasterAsset {
    /// Create an asset record whose identifier is `<collection>/<sisid>_<breeding>`.
    pub fn new(key: SpeciesKey, sci_name: impl Into<String>, collection: &str) -> Self {
        let name = key.asset_name();
        let asset_id = if collection.is_empty() {
            name
        } else {
            format!("{}/{}", collection.trim_end_matches('/'), name)
        };
        Self {
            key,
            sci_name: sci_name.into(),
            asset_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Breeding, SisId};

    #[test]
    fn test_asset_id_in_collection() {
        let key = SpeciesKey::new(SisId(5), Breeding::NonBreeding);
        let asset = RasterAsset::new(key, "Aquila chrysaetos", "ranges/run-1/");
        assert_eq!(asset.asset_id, "ranges/run-1/5_0");

        let bare = RasterAsset::new(key, "Aquila chrysaetos", "");
        assert_eq!(bare.asset_id, "5_0");
    }

    #[test]
    fn test_asset_json_handoff() {
        let key = SpeciesKey::new(SisId(5), Breeding::Breeding);
        let asset = RasterAsset::new(key, "Aquila chrysaetos", "ranges");
        let json = serde_json::to_string(&asset).unwrap();
        let back: RasterAsset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, asset);
    }
}
