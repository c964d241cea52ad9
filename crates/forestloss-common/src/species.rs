//! Species identity: SIS identifiers, breeding flags and composite-range keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CommonError, Result};

/// External species identifier (the SIS ID), the primary join key of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SisId(pub u64);

impl fmt::Display for SisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SisId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        // Spreadsheet exports sometimes render integer ids as "22680001.0".
        let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);
        digits
            .parse()
            .map(SisId)
            .map_err(|_| CommonError::InvalidSisId(s.to_string()))
    }
}

/// Which seasonal subset a composite range was dissolved from.
///
/// The numeric flag (`1` breeding, `0` non-breeding) is what appears in asset
/// names, export records and the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Breeding {
    /// Seasonality codes 1 and 3.
    NonBreeding,
    /// Seasonality codes 1 and 2.
    Breeding,
}

impl Breeding {
    /// Both subsets, in the order they are dissolved.
    pub const ALL: [Breeding; 2] = [Breeding::Breeding, Breeding::NonBreeding];

    /// Numeric flag as written in asset names and tables.
    pub const fn flag(self) -> u8 {
        match self {
            Breeding::NonBreeding => 0,
            Breeding::Breeding => 1,
        }
    }

    /// Parse the numeric flag.
    pub fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            0 => Ok(Breeding::NonBreeding),
            1 => Ok(Breeding::Breeding),
            other => Err(CommonError::InvalidBreedingFlag(other.to_string())),
        }
    }

    /// Whether a record with the given seasonality code belongs to this subset.
    ///
    /// Resident records (code 1) belong to both subsets.
    pub fn includes_seasonality(self, code: u8) -> bool {
        match self {
            Breeding::Breeding => matches!(code, 1 | 2),
            Breeding::NonBreeding => matches!(code, 1 | 3),
        }
    }
}

impl From<Breeding> for u8 {
    fn from(value: Breeding) -> Self {
        value.flag()
    }
}

impl TryFrom<u8> for Breeding {
    type Error = CommonError;

    fn try_from(value: u8) -> Result<Self> {
        Breeding::from_flag(value)
    }
}

impl fmt::Display for Breeding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag())
    }
}

impl FromStr for Breeding {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "0" | "0.0" => Ok(Breeding::NonBreeding),
            "1" | "1.0" => Ok(Breeding::Breeding),
            _ => Err(CommonError::InvalidBreedingFlag(s.to_string())),
        }
    }
}

/// Key of one composite range: a species and the seasonal subset it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesKey {
    /// Species identifier.
    pub sisid: SisId,
    /// Seasonal subset.
    pub breeding: Breeding,
}

impl SpeciesKey {
    /// Create a new key.
    pub fn new(sisid: SisId, breeding: Breeding) -> Self {
        Self { sisid, breeding }
    }

    /// Asset name for this key, `<sisid>_<breeding>`.
    pub fn asset_name(&self) -> String {
        format!("{}_{}", self.sisid, self.breeding)
    }

    /// Recover a key from an asset name or file name such as
    /// `22680001_1`, `22680001_1_uncompressed.tif` or `runs/x/22680001_0.csv`.
    pub fn from_asset_name(name: &str) -> Result<Self> {
        let base = name.rsplit('/').next().unwrap_or(name);
        let stem = base.split('.').next().unwrap_or(base);
        let mut parts = stem.split('_');

        let (Some(sisid), Some(breeding)) = (parts.next(), parts.next()) else {
            return Err(CommonError::InvalidAssetName(name.to_string()));
        };

        let sisid = sisid
            .parse()
            .map_err(|_| CommonError::InvalidAssetName(name.to_string()))?;
        let breeding = breeding
            .parse()
            .map_err(|_| CommonError::InvalidAssetName(name.to_string()))?;

        Ok(Self { sisid, breeding })
    }
}

impl fmt::Display for SpeciesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sisid, self.breeding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sisid_parse() {
        assert_eq!("22680001".parse::<SisId>().unwrap(), SisId(22680001));
        assert_eq!(" 42 ".parse::<SisId>().unwrap(), SisId(42));
        assert_eq!("22680001.0".parse::<SisId>().unwrap(), SisId(22680001));
        assert!("abc".parse::<SisId>().is_err());
        assert!("-3".parse::<SisId>().is_err());
    }

    #[test]
    fn test_breeding_seasonality_subsets() {
        assert!(Breeding::Breeding.includes_seasonality(1));
        assert!(Breeding::Breeding.includes_seasonality(2));
        assert!(!Breeding::Breeding.includes_seasonality(3));

        assert!(Breeding::NonBreeding.includes_seasonality(1));
        assert!(!Breeding::NonBreeding.includes_seasonality(2));
        assert!(Breeding::NonBreeding.includes_seasonality(3));

        for breeding in Breeding::ALL {
            assert!(!breeding.includes_seasonality(4));
        }
    }

    #[test]
    fn test_breeding_flag() {
        assert_eq!(Breeding::from_flag(1).unwrap(), Breeding::Breeding);
        assert_eq!(Breeding::from_flag(0).unwrap(), Breeding::NonBreeding);
        assert!(Breeding::from_flag(2).is_err());
        assert_eq!("1".parse::<Breeding>().unwrap(), Breeding::Breeding);
        assert_eq!(Breeding::NonBreeding.to_string(), "0");
    }

    #[test]
    fn test_asset_name() {
        let key = SpeciesKey::new(SisId(22680001), Breeding::Breeding);
        assert_eq!(key.asset_name(), "22680001_1");
        assert_eq!(SpeciesKey::from_asset_name("22680001_1").unwrap(), key);
        assert_eq!(
            SpeciesKey::from_asset_name("22680001_1_uncompressed.tif").unwrap(),
            key
        );
        assert_eq!(
            SpeciesKey::from_asset_name("exports/abc/22680001_1.csv").unwrap(),
            key
        );
        assert!(SpeciesKey::from_asset_name("22680001").is_err());
        assert!(SpeciesKey::from_asset_name("x_1").is_err());
    }

    #[test]
    fn test_breeding_serde_as_flag() {
        let json = serde_json::to_string(&Breeding::Breeding).unwrap();
        assert_eq!(json, "1");
        let back: Breeding = serde_json::from_str("0").unwrap();
        assert_eq!(back, Breeding::NonBreeding);
        assert!(serde_json::from_str::<Breeding>("7").is_err());
    }
}
