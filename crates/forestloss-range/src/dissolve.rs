//! Attribute join, filtering and per-species dissolve.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use forestloss_common::{Breeding, SisId, SpeciesKey};
use geo::{BooleanOps, MultiPolygon};

use crate::{AttributeTable, VectorRecord};

/// The dissolved breeding or non-breeding range of one species.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRange {
    /// Species and seasonal subset.
    pub key: SpeciesKey,
    /// Scientific name, taken from the first contributing record.
    pub sci_name: String,
    /// Union of the contributing geometries.
    pub geometry: MultiPolygon<f64>,
    /// Number of records unioned.
    pub record_count: usize,
}

/// Whether a record survives the join and all four filter conditions.
///
/// A species missing from the attribute table has no forest dependency and
/// is dropped.
pub fn passes_filters(record: &VectorRecord, attributes: &AttributeTable) -> bool {
    attributes
        .dependency(record.sisid)
        .is_some_and(|dep| dep.is_analysed())
        && record.codes_pass()
}

/// Join, filter, split into seasonal subsets and dissolve by species.
///
/// Composites are returned ordered by species id, breeding subset first.
pub fn dissolve(records: &[VectorRecord], attributes: &AttributeTable) -> Vec<CompositeRange> {
    let mut composites: BTreeMap<(SisId, Reverse<Breeding>), CompositeRange> = BTreeMap::new();

    for record in records.iter().filter(|r| passes_filters(r, attributes)) {
        for breeding in Breeding::ALL {
            if !record.in_subset(breeding) {
                continue;
            }

            let key = SpeciesKey::new(record.sisid, breeding);
            composites
                .entry((key.sisid, Reverse(breeding)))
                .and_modify(|composite| {
                    composite.geometry = composite.geometry.union(&record.geometry);
                    composite.record_count += 1;
                })
                .or_insert_with(|| CompositeRange {
                    key,
                    sci_name: record.sci_name.clone(),
                    geometry: MultiPolygon::new(vec![]).union(&record.geometry),
                    record_count: 1,
                });
        }
    }

    composites.into_values().collect()
}
