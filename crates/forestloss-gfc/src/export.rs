//! Export records: one CSV object per composite range.
//!
//! The layout matches a table export of a single feature: a `system:index`
//! column, the labelled areas, the taxonomy fields and an empty `.geo`
//! column. `system:index` and `.geo` carry nothing and are dropped on read.

use std::collections::BTreeMap;

use forestloss_common::{AreaResultRecord, Breeding, LayerLabel, SisId, SpeciesKey};
use tracing::{debug, warn};

use crate::{GfcError, ObjectStore, Result};

const INDEX_COLUMN: &str = "system:index";
const GEO_COLUMN: &str = ".geo";

/// Object path of a composite range's export under `prefix`.
pub fn export_path(prefix: &str, key: SpeciesKey) -> String {
    let name = format!("{}.csv", key.asset_name());
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

/// Serialize a record as a one-row export CSV.
pub fn encode_export(record: &AreaResultRecord) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![INDEX_COLUMN.to_string()];
    header.extend(record.areas.keys().map(LayerLabel::to_string));
    header.extend(["breeding", "sci_name", "sisid", GEO_COLUMN].map(String::from));
    writer.write_record(&header)?;

    let mut row = vec!["0".to_string()];
    row.extend(record.areas.values().map(f64::to_string));
    row.push(record.breeding.to_string());
    row.push(record.sci_name.clone());
    row.push(record.sisid.to_string());
    row.push(String::new());
    writer.write_record(&row)?;

    writer
        .into_inner()
        .map_err(|e| GfcError::Io(e.into_error()))
}

/// Parse a one-row export CSV.
///
/// Columns are matched by name, so their order does not matter. Columns
/// that are not layer labels or taxonomy fields are ignored.
pub fn decode_export(bytes: &[u8]) -> Result<AreaResultRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let header = reader.headers()?.clone();
    let row = reader
        .records()
        .next()
        .ok_or_else(|| GfcError::InputFormat("export record has no data row".to_string()))??;

    let mut sisid = None;
    let mut sci_name = None;
    let mut breeding = None;
    let mut areas = BTreeMap::new();

    for (name, value) in header.iter().zip(row.iter()) {
        match name {
            INDEX_COLUMN | GEO_COLUMN => {}
            "sisid" => sisid = Some(value.parse::<SisId>()?),
            "sci_name" => sci_name = Some(value.to_string()),
            "breeding" => breeding = Some(value.parse::<Breeding>()?),
            other => match other.parse::<LayerLabel>() {
                Ok(label) if value.is_empty() => {
                    debug!(%label, "export record has no value for layer");
                }
                Ok(label) => {
                    let area: f64 = value.parse().map_err(|_| {
                        GfcError::InputFormat(format!("{label}: invalid area {value:?}"))
                    })?;
                    areas.insert(label, area);
                }
                Err(_) => warn!(column = other, "ignoring unrecognised export column"),
            },
        }
    }

    let missing = |field: &str| GfcError::InputFormat(format!("export record has no {field}"));
    Ok(AreaResultRecord {
        sisid: sisid.ok_or_else(|| missing("sisid"))?,
        sci_name: sci_name.ok_or_else(|| missing("sci_name"))?,
        breeding: breeding.ok_or_else(|| missing("breeding"))?,
        areas,
    })
}

/// Load every export record stored under `prefix`.
///
/// Objects that are not `.csv` files are skipped.
pub fn load_export_records(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<AreaResultRecord>> {
    let mut records = Vec::new();
    for path in store.list(prefix)? {
        if !path.ends_with(".csv") {
            continue;
        }
        let bytes = store.get(&path)?;
        let record = decode_export(&bytes).map_err(|e| match e {
            GfcError::InputFormat(msg) => GfcError::InputFormat(format!("{path}: {msg}")),
            other => other,
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AreaResultRecord {
        let mut areas = BTreeMap::new();
        areas.insert(LayerLabel::Remaining(2001), 1234.5);
        areas.insert(LayerLabel::Loss(2001), 10.25);
        areas.insert(LayerLabel::Loss(2002), 0.0);
        AreaResultRecord {
            sisid: SisId(22695998),
            sci_name: "Harpia harpyja".to_string(),
            breeding: Breeding::Breeding,
            areas,
        }
    }

    #[test]
    fn test_export_layout() {
        let bytes = encode_export(&record()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "system:index,2001_remaining,2001_loss,2002_loss,breeding,sci_name,sisid,.geo"
        );
        assert_eq!(lines.next().unwrap(), "0,1234.5,10.25,0,1,Harpia harpyja,22695998,");
    }

    #[test]
    fn test_decode_any_column_order() {
        let csv = "system:index,2001_loss,2001_remaining,breeding,sci_name,sisid,.geo\n\
                   abc123,5.5,100,0,Strix occidentalis,22725170,\"{}\"\n";
        let record = decode_export(csv.as_bytes()).unwrap();
        assert_eq!(record.sisid, SisId(22725170));
        assert_eq!(record.breeding, Breeding::NonBreeding);
        assert_eq!(record.areas[&LayerLabel::Loss(2001)], 5.5);
        assert_eq!(record.areas[&LayerLabel::Remaining(2001)], 100.0);
    }

    #[test]
    fn test_decode_round_trip() {
        let original = record();
        let decoded = decode_export(&encode_export(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_missing_taxonomy() {
        let csv = "2001_remaining,sisid\n1,5\n";
        assert!(matches!(
            decode_export(csv.as_bytes()),
            Err(GfcError::InputFormat(_))
        ));
    }

    #[test]
    fn test_export_path() {
        let key = SpeciesKey::new(SisId(5), Breeding::NonBreeding);
        assert_eq!(export_path("exports/run-1/", key), "exports/run-1/5_0.csv");
        assert_eq!(export_path("", key), "5_0.csv");
    }

    #[test]
    fn test_load_records_of_one_run_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::DirectoryObjectStore::new(dir.path()).unwrap();

        let mine = record();
        let mut other = record();
        other.sisid = SisId(7);
        let key = SpeciesKey::new(mine.sisid, mine.breeding);
        let other_key = SpeciesKey::new(other.sisid, other.breeding);
        store
            .put(&export_path("exports/run-1", key), &encode_export(&mine).unwrap())
            .unwrap();
        store
            .put(&export_path("exports/run-10", other_key), &encode_export(&other).unwrap())
            .unwrap();

        let loaded = load_export_records(&store, "exports/run-1").unwrap();
        assert_eq!(loaded, vec![mine]);
    }
}
