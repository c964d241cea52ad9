//! The forest-dependency attribute table joined onto range records.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use forestloss_common::SisId;
use tracing::debug;

use crate::{ForestDependency, RangeError, Result};

const SISID_COLUMNS: [&str; 2] = ["SIS ID", "SISID"];
const DEPENDENCY_COLUMN: &str = "Forest dependency";

/// Forest dependency per species, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    dependency: HashMap<SisId, ForestDependency>,
}

impl AttributeTable {
    /// Load a CSV with a `SIS ID` (or `SISID`) column and a `Forest dependency` column.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let table = Self::from_reader(file)?;
        debug!(path = %path.as_ref().display(), species = table.len(), "loaded attribute table");
        Ok(table)
    }

    /// Load the table from any CSV reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv.headers()?.clone();
        let sisid_col = headers
            .iter()
            .position(|h| SISID_COLUMNS.contains(&h))
            .ok_or_else(|| {
                RangeError::InputFormat("attribute table has no \"SIS ID\" column".to_string())
            })?;
        let dep_col = headers
            .iter()
            .position(|h| h == DEPENDENCY_COLUMN)
            .ok_or_else(|| {
                RangeError::InputFormat(format!(
                    "attribute table has no {DEPENDENCY_COLUMN:?} column"
                ))
            })?;

        let mut dependency = HashMap::new();
        for (line, row) in csv.records().enumerate() {
            let row = row?;
            let Some(raw_id) = row.get(sisid_col).filter(|s| !s.is_empty()) else {
                continue;
            };
            let sisid: SisId = raw_id.parse().map_err(|_| {
                RangeError::InputFormat(format!(
                    "attribute table row {}: invalid SIS ID {raw_id:?}",
                    line + 2
                ))
            })?;
            let category = ForestDependency::from(row.get(dep_col).unwrap_or_default());
            dependency.insert(sisid, category);
        }

        Ok(Self { dependency })
    }

    /// Build a table directly from pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (SisId, ForestDependency)>) -> Self {
        Self {
            dependency: pairs.into_iter().collect(),
        }
    }

    /// Forest dependency of a species, or `None` if it is not in the table.
    pub fn dependency(&self, sisid: SisId) -> Option<&ForestDependency> {
        self.dependency.get(&sisid)
    }

    /// Number of species in the table.
    pub fn len(&self) -> usize {
        self.dependency.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.dependency.is_empty()
    }
}
