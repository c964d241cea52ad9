//! Row-addressable sources of range records.

use std::fs;
use std::path::Path;

use forestloss_common::SisId;
use geo::{Geometry, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonValue};
use tracing::debug;

use crate::{RangeError, Result, VectorRecord};

/// A collection of range records readable by contiguous row range.
///
/// Row order is significant: records of one species are expected to be
/// contiguous, and chunking defers a trailing species to the next chunk.
pub trait VectorSource {
    /// Total number of rows.
    fn len(&self) -> usize;

    /// Whether the source has no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read rows `[start, start + count)`, clipped to the end of the source.
    fn read_rows(&self, start: usize, count: usize) -> Result<Vec<VectorRecord>>;
}

/// An in-memory vector source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<VectorRecord>,
}

impl MemorySource {
    /// Wrap a list of records.
    pub fn new(records: Vec<VectorRecord>) -> Self {
        Self { records }
    }
}

impl VectorSource for MemorySource {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn read_rows(&self, start: usize, count: usize) -> Result<Vec<VectorRecord>> {
        let start = start.min(self.records.len());
        let end = start.saturating_add(count).min(self.records.len());
        Ok(self.records[start..end].to_vec())
    }
}

/// A GeoJSON FeatureCollection of range polygons.
///
/// Features carry `SISID`, `SCINAME`, `PRESENCE`, `ORIGIN` and `SEASONAL`
/// properties; codes may be JSON numbers or numeric strings. Features are
/// converted to records only when their rows are read, so a malformed feature
/// fails the chunk that reads it.
#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    features: Vec<Feature>,
}

impl GeoJsonSource {
    /// Load a FeatureCollection file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let source = Self::from_str_collection(&text)?;
        debug!(path = %path.as_ref().display(), rows = source.len(), "opened GeoJSON range source");
        Ok(source)
    }

    /// Parse a FeatureCollection from a string.
    pub fn from_str_collection(text: &str) -> Result<Self> {
        let geojson: GeoJson = text.parse()?;
        let collection = FeatureCollection::try_from(geojson)?;
        Ok(Self {
            features: collection.features,
        })
    }
}

impl VectorSource for GeoJsonSource {
    fn len(&self) -> usize {
        self.features.len()
    }

    fn read_rows(&self, start: usize, count: usize) -> Result<Vec<VectorRecord>> {
        let start = start.min(self.features.len());
        let end = start.saturating_add(count).min(self.features.len());
        self.features[start..end]
            .iter()
            .enumerate()
            .map(|(offset, feature)| feature_to_record(feature, start + offset))
            .collect()
    }
}

fn feature_to_record(feature: &Feature, row: usize) -> Result<VectorRecord> {
    let invalid = |what: String| RangeError::InputFormat(format!("row {row}: {what}"));

    let sisid = SisId(integer_property(feature, "SISID").map_err(&invalid)?);
    let sci_name = match feature.property("SCINAME") {
        Some(JsonValue::String(name)) => name.trim().to_string(),
        other => return Err(invalid(format!("SCINAME must be a string, found {other:?}"))),
    };
    let presence = code_property(feature, "PRESENCE").map_err(&invalid)?;
    let origin = code_property(feature, "ORIGIN").map_err(&invalid)?;
    let seasonal = code_property(feature, "SEASONAL").map_err(&invalid)?;

    let value = feature
        .geometry
        .as_ref()
        .ok_or_else(|| invalid("feature has no geometry".to_string()))?
        .value
        .clone();
    let geometry = match Geometry::<f64>::try_from(value)? {
        Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
        Geometry::MultiPolygon(multi) => multi,
        other => {
            return Err(invalid(format!(
                "expected Polygon or MultiPolygon, found {}",
                geometry_kind(&other)
            )))
        }
    };

    Ok(VectorRecord {
        sisid,
        sci_name,
        geometry,
        presence,
        origin,
        seasonal,
    })
}

fn integer_property(feature: &Feature, name: &str) -> std::result::Result<u64, String> {
    let value = feature
        .property(name)
        .ok_or_else(|| format!("missing {name} property"))?;
    let parsed = match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        JsonValue::String(s) => {
            let s = s.trim();
            s.strip_suffix(".0").unwrap_or(s).parse().ok()
        }
        _ => None,
    };
    parsed.ok_or_else(|| format!("{name} is not a non-negative integer: {value}"))
}

fn code_property(feature: &Feature, name: &str) -> std::result::Result<u8, String> {
    let value = integer_property(feature, name)?;
    u8::try_from(value).map_err(|_| format!("{name} code {value} out of range"))
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
