//! Species altitude limits.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{GfcError, Result};

/// Altitude in metres above every point on Earth; the open upper limit.
pub const MAX_ALTITUDE: f64 = 10_000.0;

/// Elevation band a species occupies, in metres, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltitudeBand {
    /// Minimum elevation.
    pub min: f64,
    /// Maximum elevation.
    pub max: f64,
}

impl AltitudeBand {
    /// The band used for species without altitude limits.
    pub const FULL: AltitudeBand = AltitudeBand {
        min: 0.0,
        max: MAX_ALTITUDE,
    };

    /// Whether `elevation` lies inside the band.
    pub fn contains(&self, elevation: f64) -> bool {
        elevation >= self.min && elevation <= self.max
    }
}

impl Default for AltitudeBand {
    fn default() -> Self {
        Self::FULL
    }
}

/// Altitude limits keyed by scientific name.
#[derive(Debug, Clone, Default)]
pub struct AltitudeTable {
    bands: HashMap<String, AltitudeBand>,
}

impl AltitudeTable {
    /// Load the limits CSV.
    ///
    /// The first row is a header and is skipped. Columns are scientific name,
    /// minimum altitude, maximum altitude and a fourth column (the source of
    /// the limits) that is ignored. `NA` means no limit: 0 for the minimum and
    /// [`MAX_ALTITUDE`] for the maximum.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let table = Self::from_reader(file)?;
        debug!(path = %path.as_ref().display(), species = table.len(), "loaded altitude limits");
        Ok(table)
    }

    /// Load the limits from any CSV reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut bands = HashMap::new();
        for (line, row) in csv.records().enumerate() {
            let row = row?;
            let invalid = |what: &str| {
                GfcError::InputFormat(format!("altitude table row {}: {what}", line + 2))
            };
            if row.len() < 3 {
                return Err(invalid("expected name, minimum and maximum columns"));
            }

            let name = row[0].to_string();
            let min = parse_altitude(&row[1], 0.0).ok_or_else(|| invalid("invalid minimum"))?;
            let max = parse_altitude(&row[2], MAX_ALTITUDE)
                .ok_or_else(|| invalid("invalid maximum"))?;
            bands.insert(name, AltitudeBand { min, max });
        }

        Ok(Self { bands })
    }

    /// Band for a species, or [`AltitudeBand::FULL`] if it has no entry.
    pub fn band(&self, sci_name: &str) -> AltitudeBand {
        self.bands.get(sci_name).copied().unwrap_or(AltitudeBand::FULL)
    }

    /// Number of species with limits.
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

fn parse_altitude(value: &str, na: f64) -> Option<f64> {
    if value == "NA" {
        return Some(na);
    }
    value.parse().ok().filter(|v: &f64| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
scientific_name,min,max,source
Harpia harpyja,0,2000,Davies
Strix occidentalis,NA,2700,BirdLife
Aquila chrysaetos,300,NA,BirdLife
";

    #[test]
    fn test_parse_with_na() {
        let table = AltitudeTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.band("Harpia harpyja"), AltitudeBand { min: 0.0, max: 2000.0 });
        assert_eq!(table.band("Strix occidentalis"), AltitudeBand { min: 0.0, max: 2700.0 });
        assert_eq!(
            table.band("Aquila chrysaetos"),
            AltitudeBand { min: 300.0, max: MAX_ALTITUDE }
        );
    }

    #[test]
    fn test_missing_species_gets_full_band() {
        let table = AltitudeTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(table.band("Pandion haliaetus"), AltitudeBand::FULL);
    }

    #[test]
    fn test_band_is_inclusive() {
        let band = AltitudeBand { min: 100.0, max: 200.0 };
        assert!(band.contains(100.0));
        assert!(band.contains(200.0));
        assert!(!band.contains(99.9));
        assert!(!band.contains(200.1));
    }

    #[test]
    fn test_malformed_row() {
        let err = AltitudeTable::from_reader("h1,h2,h3,h4\nA,low,10,x\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }
}
