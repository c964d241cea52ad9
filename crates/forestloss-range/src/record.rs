//! Vector range records and their attribute codes.

use std::fmt;
use std::str::FromStr;

use forestloss_common::{Breeding, SisId};
use geo::MultiPolygon;

/// Presence codes kept by the filter (extant, probably extant).
pub const KEPT_PRESENCE: [u8; 2] = [1, 2];
/// Origin codes kept by the filter (native, reintroduced, assisted colonisation).
pub const KEPT_ORIGIN: [u8; 3] = [1, 2, 6];
/// Seasonality codes kept by the filter (resident, breeding, non-breeding).
pub const KEPT_SEASONAL: [u8; 3] = [1, 2, 3];

/// One range polygon from the vector source.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Species identifier.
    pub sisid: SisId,
    /// Scientific name.
    pub sci_name: String,
    /// Range geometry in longitude/latitude degrees.
    pub geometry: MultiPolygon<f64>,
    /// Presence code.
    pub presence: u8,
    /// Origin code.
    pub origin: u8,
    /// Seasonality code.
    pub seasonal: u8,
}

impl VectorRecord {
    /// Whether the presence, origin and seasonality codes pass the filter.
    pub fn codes_pass(&self) -> bool {
        KEPT_PRESENCE.contains(&self.presence)
            && KEPT_ORIGIN.contains(&self.origin)
            && KEPT_SEASONAL.contains(&self.seasonal)
    }

    /// Whether the record belongs to the given seasonal subset.
    pub fn in_subset(&self, breeding: Breeding) -> bool {
        breeding.includes_seasonality(self.seasonal)
    }
}

/// Forest-dependency category from the attribute table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ForestDependency {
    /// Low dependency.
    Low,
    /// Medium dependency.
    Medium,
    /// High dependency.
    High,
    /// Any other category, such as "Does not normally occur in forest".
    Other(String),
}

impl ForestDependency {
    /// Medium and High species are analysed.
    pub fn is_analysed(&self) -> bool {
        matches!(self, ForestDependency::Medium | ForestDependency::High)
    }
}

impl From<&str> for ForestDependency {
    fn from(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "low" => ForestDependency::Low,
            "medium" => ForestDependency::Medium,
            "high" => ForestDependency::High,
            _ => ForestDependency::Other(trimmed.to_string()),
        }
    }
}

impl FromStr for ForestDependency {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ForestDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForestDependency::Low => f.write_str("Low"),
            ForestDependency::Medium => f.write_str("Medium"),
            ForestDependency::High => f.write_str("High"),
            ForestDependency::Other(other) => f.write_str(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(presence: u8, origin: u8, seasonal: u8) -> VectorRecord {
        VectorRecord {
            sisid: SisId(1),
            sci_name: "Harpia harpyja".to_string(),
            geometry: MultiPolygon::new(vec![]),
            presence,
            origin,
            seasonal,
        }
    }

    #[test]
    fn test_codes_pass() {
        assert!(record(1, 1, 1).codes_pass());
        assert!(record(2, 6, 3).codes_pass());
        assert!(!record(3, 1, 1).codes_pass());
        assert!(!record(1, 3, 1).codes_pass());
        assert!(!record(1, 1, 4).codes_pass());
    }

    #[test]
    fn test_resident_in_both_subsets() {
        let resident = record(1, 1, 1);
        assert!(resident.in_subset(Breeding::Breeding));
        assert!(resident.in_subset(Breeding::NonBreeding));

        let breeding = record(1, 1, 2);
        assert!(breeding.in_subset(Breeding::Breeding));
        assert!(!breeding.in_subset(Breeding::NonBreeding));

        let wintering = record(1, 1, 3);
        assert!(!wintering.in_subset(Breeding::Breeding));
        assert!(wintering.in_subset(Breeding::NonBreeding));
    }

    #[test]
    fn test_forest_dependency_parse() {
        assert_eq!("High".parse::<ForestDependency>().unwrap(), ForestDependency::High);
        assert_eq!(" medium ".parse::<ForestDependency>().unwrap(), ForestDependency::Medium);
        let other: ForestDependency = "Does not normally occur in forest".parse().unwrap();
        assert!(!other.is_analysed());
        assert!(ForestDependency::High.is_analysed());
        assert!(!ForestDependency::Low.is_analysed());
    }
}
