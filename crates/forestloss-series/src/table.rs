//! The combined output table.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use forestloss_common::{GfcYears, SpeciesKey};

use crate::{CoverSeries, ExtrapolationResult, Result, SeriesError};

/// One output row: a species' series and its three-generation loss.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    /// Composite range the row describes.
    pub key: SpeciesKey,
    /// Scientific name.
    pub sci_name: String,
    /// Reconstructed remaining-cover series.
    pub series: CoverSeries,
    /// Loss over the three-generation window.
    pub result: ExtrapolationResult,
}

/// Column names of the output table for `years`.
///
/// `<Y>_loss` is the loss taking `remaining[Y-1]` to `remaining[Y]`, so loss
/// columns run from `year0 + 1` while remaining columns start at year0.
pub fn output_header(years: &GfcYears) -> Vec<String> {
    let end = years.final_year + 1;
    let mut header = vec!["sisid".to_string(), "sci_name".to_string(), "breeding".to_string()];
    header.extend((years.first_year() + 1..=end).map(|y| format!("{y}_loss")));
    header.extend(years.remaining_years().map(|y| format!("{y}_remaining")));
    header.extend(
        ["3gl_start", "3gl_finish", "3gl_loss", "3gl_percent_loss"]
            .iter()
            .map(|s| s.to_string()),
    );
    header
}

/// Append-only CSV writer for [`SeriesRow`]s.
///
/// The header is written when the table is created; each appended row is
/// flushed immediately.
pub struct OutputTable<W: Write> {
    writer: csv::Writer<W>,
    years: GfcYears,
    rows: usize,
}

impl OutputTable<File> {
    /// Create (or truncate) the table file and write its header.
    pub fn create<P: AsRef<Path>>(path: P, years: GfcYears) -> Result<Self> {
        Self::from_writer(File::create(path)?, years)
    }
}

impl<W: Write> OutputTable<W> {
    /// Start a table on any writer, writing the header.
    pub fn from_writer(writer: W, years: GfcYears) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(output_header(&years))?;
        writer.flush()?;
        Ok(Self {
            writer,
            years,
            rows: 0,
        })
    }

    /// Append one row.
    pub fn append(&mut self, row: &SeriesRow) -> Result<()> {
        if row.series.years() != &self.years {
            return Err(SeriesError::InputFormat(format!(
                "row for {} covers {}..={}, table covers {}..={}",
                row.key,
                row.series.years().first_year(),
                row.series.years().final_year,
                self.years.first_year(),
                self.years.final_year
            )));
        }

        let mut record = vec![
            row.key.sisid.to_string(),
            row.sci_name.clone(),
            row.key.breeding.flag().to_string(),
        ];
        record.extend(
            self.years
                .loss_years()
                .map(|y| row.series.loss(y).unwrap_or_default().to_string()),
        );
        record.extend(row.series.points().map(|(_, remaining)| remaining.to_string()));
        record.extend(
            [row.result.start, row.result.finish, row.result.loss, row.result.percent_loss]
                .iter()
                .map(f64::to_string),
        );

        self.writer.write_record(&record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows appended so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| SeriesError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_columns() {
        let years = GfcYears::hansen(2003).unwrap();
        assert_eq!(
            output_header(&years),
            vec![
                "sisid",
                "sci_name",
                "breeding",
                "2002_loss",
                "2003_loss",
                "2004_loss",
                "2001_remaining",
                "2002_remaining",
                "2003_remaining",
                "2004_remaining",
                "3gl_start",
                "3gl_finish",
                "3gl_loss",
                "3gl_percent_loss",
            ]
        );
    }

    #[test]
    fn test_empty_table_has_header_only() {
        let years = GfcYears::hansen(2002).unwrap();
        let table = OutputTable::from_writer(Vec::new(), years).unwrap();
        assert_eq!(table.rows(), 0);
        let text = String::from_utf8(table.into_inner().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("sisid,sci_name,breeding,2002_loss,2003_loss,"));
    }
}
