//! Batch reconstruction of area records into the output table.

use std::io::Write;

use forestloss_common::{AreaResultRecord, GfcYears, SpeciesKey, ValidatedRecord};
use forestloss_metrics::{metric_defs, StageLabels};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{three_generation_loss, CoverSeries, ExtrapolationResult, GenerationLengthTable, OutputTable, Result, SeriesError, SeriesRow};

/// Rebuild a record's series and compute its three-generation loss.
pub fn reconstruct(record: &ValidatedRecord, generation_length: f64) -> Result<(CoverSeries, ExtrapolationResult)> {
    let series = CoverSeries::from_record(record);
    let result = three_generation_loss(&series, generation_length, record.key())?;
    Ok((series, result))
}

/// A species left out of the output table, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSpecies {
    /// Composite range that was skipped.
    pub key: SpeciesKey,
    /// Scientific name.
    pub sci_name: String,
    /// Error that caused the skip.
    pub reason: String,
}

/// Outcome of [`TimeSeriesReconstructor::process`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructionSummary {
    /// Rows appended to the output table.
    pub rows_written: usize,
    /// Species reported and skipped.
    pub skipped: Vec<SkippedSpecies>,
}

/// Turns area result records into rows of the combined output table.
pub struct TimeSeriesReconstructor {
    years: GfcYears,
    generation_lengths: GenerationLengthTable,
    labels: StageLabels,
}

impl TimeSeriesReconstructor {
    /// Create a reconstructor for records covering `years`.
    pub fn new(years: GfcYears, generation_lengths: GenerationLengthTable) -> Self {
        Self {
            years,
            generation_lengths,
            labels: StageLabels::new("postprocess", ""),
        }
    }

    /// Tag metrics with the given run identifier.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.labels = StageLabels::new("postprocess", run_id);
        self
    }

    /// Validate one record and build its output row.
    pub fn row(&self, record: AreaResultRecord) -> Result<SeriesRow> {
        let key = record.key();
        let sci_name = record.sci_name.clone();
        let validated = record.validate(&self.years)?;
        let generation_length = self
            .generation_lengths
            .get(&sci_name)
            .ok_or_else(|| SeriesError::MissingGenerationLength {
                key,
                sci_name: sci_name.clone(),
            })?;

        let (series, result) = reconstruct(&validated, generation_length)?;
        debug!(
            %key,
            generation_length,
            start = result.start,
            loss = result.loss,
            percent_loss = result.percent_loss,
            method = ?result.method,
            "reconstructed series"
        );
        Ok(SeriesRow {
            key,
            sci_name,
            series,
            result,
        })
    }

    /// Append a row per record to `table`.
    ///
    /// A record that fails validation, lacks a generation length or hits an
    /// arithmetic-domain error is reported in the summary and skipped. Write
    /// failures abort the batch.
    pub fn process<W, I>(&self, records: I, table: &mut OutputTable<W>) -> Result<ReconstructionSummary>
    where
        W: Write,
        I: IntoIterator<Item = AreaResultRecord>,
    {
        let mut summary = ReconstructionSummary::default();
        let labels = self.labels.to_labels();

        for record in records {
            let key = record.key();
            let sci_name = record.sci_name.clone();
            match self.row(record) {
                Ok(row) => {
                    table.append(&row)?;
                    summary.rows_written += 1;
                    metrics::counter!(metric_defs::ROWS_WRITTEN.name, &labels).increment(1);
                    metrics::histogram!(metric_defs::PERCENT_LOSS.name, &labels)
                        .record(row.result.percent_loss);
                }
                Err(
                    e @ (SeriesError::Common(_)
                    | SeriesError::MissingGenerationLength { .. }
                    | SeriesError::ArithmeticDomain { .. }),
                ) => {
                    warn!(%key, %sci_name, error = %e, "skipping species");
                    metrics::counter!(
                        metric_defs::SPECIES_SKIPPED.name,
                        &self.labels.with(&[("reason", e.skip_reason().to_string())])
                    )
                    .increment(1);
                    summary.skipped.push(SkippedSpecies {
                        key,
                        sci_name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            rows = summary.rows_written,
            skipped = summary.skipped.len(),
            "post-processing complete"
        );
        Ok(summary)
    }
}
