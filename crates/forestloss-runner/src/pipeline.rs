//! The three pipeline stages and the end-to-end run.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use forestloss_common::{RasterAsset, SpeciesKey};
use forestloss_gfc::{load_export_records, AltitudeTable, AwaitSummary, RemoteJobFailure, RemoteJobOrchestrator};
use forestloss_range::{
    AttributeTable, ChunkReport, ChunkedDissolveRasterizer, GeoJsonSource, RasterizerOptions, VectorSource,
};
use forestloss_series::{GenerationLengthTable, OutputTable, ReconstructionSummary, TimeSeriesReconstructor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{PipelineContext, Result};

/// Input and output paths of a full run.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    /// GeoJSON range polygons, grouped by species.
    pub ranges: PathBuf,
    /// Forest-dependency attribute CSV.
    pub attributes: PathBuf,
    /// Altitude limits CSV.
    pub altitude: PathBuf,
    /// Generation lengths CSV.
    pub generation_lengths: PathBuf,
    /// Combined output table to create.
    pub output: PathBuf,
}

/// What a full run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: String,
    /// Uploaded assets.
    pub rasterize: AssetList,
    /// Area jobs that failed; their species have no output row.
    pub failures: Vec<RemoteJobFailure>,
    /// Rows written and species skipped by post-processing.
    pub postprocess: ReconstructionSummary,
}

/// Masks uploaded by a run, saved as JSON after every rasterized chunk.
///
/// An interrupted rasterize stage leaves the list describing every chunk
/// that finished, and `next_row` says where to resume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetList {
    /// First row not yet rasterized.
    pub next_row: usize,
    /// Uploaded masks, in upload order.
    pub assets: Vec<RasterAsset>,
}

impl AssetList {
    /// Read a list saved by [`AssetList::save`].
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    /// Write the list, replacing any earlier version in one rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = path.with_extension("json.partial");
        fs::write(&partial, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&partial, path)?;
        Ok(())
    }

    /// Add one chunk's uploads.
    ///
    /// Entries for species the chunk uploaded again (a redone chunk) are
    /// replaced rather than duplicated.
    pub fn record_chunk(&mut self, report: &ChunkReport, assets: &[RasterAsset]) {
        let redone: HashSet<SpeciesKey> = assets.iter().map(|a| a.key).collect();
        self.assets.retain(|a| !redone.contains(&a.key));
        self.assets.extend_from_slice(assets);
        self.next_row = report.end_row;
    }
}

/// Stage 1: rasterize range polygons from `start_row` onwards and upload the masks.
///
/// The run's asset list at `asset_list` is saved after every chunk. Starting
/// at row 0 begins a new list; any later row extends the saved one.
pub fn rasterize(
    ctx: &PipelineContext,
    ranges: &Path,
    attributes: &Path,
    start_row: usize,
    asset_list: &Path,
) -> Result<AssetList> {
    let config = ctx.config();
    let source = GeoJsonSource::from_path(ranges)?;
    let attributes = AttributeTable::from_path(attributes)?;
    info!(rows = source.len(), species = attributes.len(), start_row, "rasterize stage starting");

    let mut list = if start_row == 0 {
        AssetList::default()
    } else if asset_list.is_file() {
        AssetList::from_path(asset_list)?
    } else {
        warn!(path = %asset_list.display(), start_row, "no saved asset list to resume, starting a new one");
        AssetList::default()
    };
    if start_row > list.next_row {
        warn!(
            start_row,
            next_row = list.next_row,
            "resuming past the saved next row; rows in between are not rasterized"
        );
    }
    list.next_row = start_row;
    list.save(asset_list)?;

    let options = RasterizerOptions {
        pixel: ctx.pixel(),
        chunk_size: config.chunk_size,
        containment: config.containment,
        work_dir: ctx.work_dir(),
        collection: ctx.asset_collection(),
    };
    let rasterizer = ChunkedDissolveRasterizer::new(options, ctx.raster_store())?.with_run_id(ctx.run_id());
    let output = rasterizer.process_with(&source, &attributes, start_row, |report, assets| -> Result<()> {
        list.record_chunk(report, assets);
        list.save(asset_list)?;
        debug!(next_row = list.next_row, assets = list.assets.len(), "saved asset list");
        Ok(())
    })?;

    info!(
        chunks = output.chunks.len(),
        uploaded = output.assets.len(),
        assets = list.assets.len(),
        path = %asset_list.display(),
        "rasterize stage complete"
    );
    Ok(list)
}

/// Stage 2: submit one area job per asset and wait for all of them.
pub fn analyse(ctx: &PipelineContext, assets: &[RasterAsset], altitude: &Path) -> Result<AwaitSummary> {
    let config = ctx.config();
    let altitude = AltitudeTable::from_path(altitude)?;
    info!(assets = assets.len(), altitude_entries = altitude.len(), "analyse stage starting");

    let orchestrator =
        RemoteJobOrchestrator::new(ctx.compute_backend()?, ctx.years(), config.analysis, config.reduction)
            .with_run_id(ctx.run_id());
    let jobs = orchestrator.submit_area_jobs(assets, &altitude, &ctx.export_prefix())?;
    let summary = orchestrator.await_all(&jobs)?;
    for failure in summary.failures() {
        warn!("{failure}");
    }
    Ok(summary)
}

/// Stage 3: reconstruct every exported record into the combined output table.
///
/// When `only` is given, records for other species are ignored.
pub fn postprocess(
    ctx: &PipelineContext,
    generation_lengths: &Path,
    output: &Path,
    only: Option<&HashSet<SpeciesKey>>,
) -> Result<ReconstructionSummary> {
    let generation_lengths = GenerationLengthTable::from_path(generation_lengths)?;
    let store = ctx.object_store();
    let mut records = load_export_records(store.as_ref(), &ctx.export_prefix())?;
    if let Some(keys) = only {
        records.retain(|r| keys.contains(&r.key()));
    }
    info!(records = records.len(), output = %output.display(), "post-process stage starting");

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut table = OutputTable::create(output, ctx.years())?;
    let reconstructor = TimeSeriesReconstructor::new(ctx.years(), generation_lengths).with_run_id(ctx.run_id());
    Ok(reconstructor.process(records, &mut table)?)
}

/// Run all three stages in order.
///
/// The asset list is saved at [`PipelineContext::asset_list_path`], so the
/// analyse stage can be repeated on its own.
pub fn run(ctx: &PipelineContext, inputs: &PipelineInputs) -> Result<RunReport> {
    info!(run_id = %ctx.run_id(), "pipeline run starting");

    let rasterized = rasterize(ctx, &inputs.ranges, &inputs.attributes, 0, &ctx.asset_list_path())?;

    let summary = analyse(ctx, &rasterized.assets, &inputs.altitude)?;
    let completed: HashSet<SpeciesKey> = summary.completed().map(|job| job.asset.key).collect();

    let postprocessed = postprocess(ctx, &inputs.generation_lengths, &inputs.output, Some(&completed))?;

    info!(
        run_id = %ctx.run_id(),
        assets = rasterized.assets.len(),
        failed_jobs = summary.failures().len(),
        rows = postprocessed.rows_written,
        skipped = postprocessed.skipped.len(),
        "pipeline run complete"
    );
    Ok(RunReport {
        run_id: ctx.run_id().to_string(),
        rasterize: rasterized,
        failures: summary.failures(),
        postprocess: postprocessed,
    })
}
