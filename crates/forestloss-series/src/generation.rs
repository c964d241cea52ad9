//! Species generation lengths.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::{Result, SeriesError};

/// Generation length in years keyed by scientific name.
#[derive(Debug, Clone, Default)]
pub struct GenerationLengthTable {
    lengths: HashMap<String, f64>,
}

impl GenerationLengthTable {
    /// Load the table from a CSV file with no header row.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let table = Self::from_reader(file)?;
        debug!(path = %path.as_ref().display(), species = table.len(), "loaded generation lengths");
        Ok(table)
    }

    /// Load `scientific_name,generation_length_years` rows from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut lengths = HashMap::new();
        for (line, row) in csv.records().enumerate() {
            let row = row?;
            let invalid = |what: &str| {
                SeriesError::InputFormat(format!("generation length row {}: {what}", line + 1))
            };
            if row.len() < 2 {
                return Err(invalid("expected name and generation length"));
            }
            let years: f64 = row[1]
                .parse()
                .map_err(|_| invalid("generation length is not a number"))?;
            if !years.is_finite() || years <= 0.0 {
                return Err(invalid("generation length must be positive"));
            }
            lengths.insert(row[0].to_string(), years);
        }
        Ok(Self { lengths })
    }

    /// Build a table from name and length pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            lengths: pairs.into_iter().map(|(name, gl)| (name.into(), gl)).collect(),
        }
    }

    /// Generation length of a species, in years.
    pub fn get(&self, sci_name: &str) -> Option<f64> {
        self.lengths.get(sci_name).copied()
    }

    /// Number of species in the table.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}
