//! The chunked filter → dissolve → rasterize → upload loop.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use forestloss_common::{RasterAsset, SisId, SpeciesKey};
use forestloss_metrics::{metric_defs, StageLabels};
use forestloss_raster::{read_mask_u8, write_mask_u8, PackedMask, PixelSize, RasterStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    burn, cut_chunk, dissolve, AttributeTable, CompositeRange, ContainmentRule, RangeError,
    Result, VectorRecord, VectorSource, OUTSIDE,
};

/// Default number of rows read per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Settings for one rasterization pass.
#[derive(Debug, Clone)]
pub struct RasterizerOptions {
    /// Lattice pixel size shared by every mask.
    pub pixel: PixelSize,
    /// Rows read per chunk.
    pub chunk_size: usize,
    /// Which pixels count as inside a range.
    pub containment: ContainmentRule,
    /// Directory for transient uncompressed GeoTIFFs.
    pub work_dir: PathBuf,
    /// Asset collection the masks are uploaded into.
    pub collection: String,
}

/// What one chunk did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReport {
    /// First row of the chunk; pass this as the start row to redo it.
    pub start_row: usize,
    /// One past the last retained row.
    pub end_row: usize,
    /// Whether the chunk reached the end of the source.
    pub is_final: bool,
    /// Species deferred to the next chunk.
    pub deferred: Option<SisId>,
    /// Composite ranges uploaded from this chunk.
    pub composites: usize,
}

/// Result of a rasterization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterizeOutput {
    /// Uploaded masks, in upload order.
    pub assets: Vec<RasterAsset>,
    /// One report per chunk, in row order.
    pub chunks: Vec<ChunkReport>,
}

/// Reads range records in chunks and turns each chunk's composite ranges
/// into uploaded 1-bit masks.
///
/// Chunks are processed strictly in row order: the boundary rule defers the
/// trailing species of each chunk to the next one.
pub struct ChunkedDissolveRasterizer {
    options: RasterizerOptions,
    store: Arc<dyn RasterStore>,
    labels: StageLabels,
}

impl ChunkedDissolveRasterizer {
    /// Create a rasterizer uploading into `store`.
    pub fn new(options: RasterizerOptions, store: Arc<dyn RasterStore>) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(RangeError::InvalidChunkSize);
        }
        Ok(Self {
            options,
            store,
            labels: StageLabels::new("rasterize", ""),
        })
    }

    /// Tag recorded metrics with a run identifier.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.labels = StageLabels::new("rasterize", run_id);
        self
    }

    /// Options in use.
    pub fn options(&self) -> &RasterizerOptions {
        &self.options
    }

    /// Process every chunk from `start_row` to the end of the source.
    ///
    /// Pass a `start_row` from an earlier run's [`ChunkReport`] to resume.
    pub fn process(
        &self,
        source: &dyn VectorSource,
        attributes: &AttributeTable,
        start_row: usize,
    ) -> Result<RasterizeOutput> {
        self.process_with(source, attributes, start_row, |_, _| Ok(()))
    }

    /// Like [`process`](Self::process), calling `on_chunk` after every chunk
    /// with its report and the assets it uploaded.
    ///
    /// Assets handed to `on_chunk` are already in the store, so a caller that
    /// persists them there keeps every upload even when a later chunk fails.
    /// An error from `on_chunk` stops the traversal.
    pub fn process_with<E, F>(
        &self,
        source: &dyn VectorSource,
        attributes: &AttributeTable,
        start_row: usize,
        mut on_chunk: F,
    ) -> std::result::Result<RasterizeOutput, E>
    where
        E: From<RangeError>,
        F: FnMut(&ChunkReport, &[RasterAsset]) -> std::result::Result<(), E>,
    {
        let total = source.len();
        if start_row > total {
            return Err(RangeError::InputFormat(format!(
                "start row {start_row} is past the end of the source ({total} rows)"
            ))
            .into());
        }

        fs::create_dir_all(&self.options.work_dir).map_err(RangeError::from)?;

        let mut output = RasterizeOutput::default();
        let mut uploaded = HashSet::new();
        let mut start = start_row;

        while start < total {
            let count = self.options.chunk_size.min(total - start);
            // One extra row tells whether the trailing species continues.
            let wanted = (count + 1).min(total - start);
            let mut records = source.read_rows(start, wanted)?;
            if records.len() != wanted {
                return Err(RangeError::InputFormat(format!(
                    "rows {start}..{}: source returned {} rows",
                    start + wanted,
                    records.len()
                ))
                .into());
            }
            let next = records.get(count).map(|r| r.sisid);
            records.truncate(count);

            let sisids: Vec<SisId> = records.iter().map(|r| r.sisid).collect();
            let cut = cut_chunk(&sisids, next, start, total, self.options.chunk_size)?;
            let end = start + cut.retained;
            info!(start, end, deferred = ?cut.deferred, "read chunk");

            let assets = self.process_chunk(&records[..cut.retained], attributes, &mut uploaded)?;

            let labels = self.labels.to_labels();
            metrics::counter!(metric_defs::CHUNKS_PROCESSED.name, &labels).increment(1);
            metrics::counter!(metric_defs::ROWS_READ.name, &labels).increment(cut.retained as u64);

            let report = ChunkReport {
                start_row: start,
                end_row: end,
                is_final: cut.is_final,
                deferred: cut.deferred,
                composites: assets.len(),
            };
            on_chunk(&report, &assets)?;

            output.chunks.push(report);
            output.assets.extend(assets);
            start = end;
        }

        info!(
            chunks = output.chunks.len(),
            assets = output.assets.len(),
            "rasterization complete"
        );
        Ok(output)
    }

    /// Filter, dissolve, rasterize and upload one chunk's retained records.
    ///
    /// `uploaded` tracks keys already produced in this traversal; a repeat
    /// means the source was not grouped by species.
    pub fn process_chunk(
        &self,
        records: &[VectorRecord],
        attributes: &AttributeTable,
        uploaded: &mut HashSet<SpeciesKey>,
    ) -> Result<Vec<RasterAsset>> {
        let composites = dissolve(records, attributes);
        if composites.is_empty() {
            info!(rows = records.len(), "all rows filtered out, moving on to next chunk");
            return Ok(Vec::new());
        }
        debug!(composites = composites.len(), "dissolved chunk");

        let mut assets = Vec::with_capacity(composites.len());
        for composite in composites {
            if !uploaded.insert(composite.key) {
                return Err(RangeError::DuplicateComposite(composite.key));
            }
            if let Some(asset) = self.rasterize_and_upload(&composite)? {
                assets.push(asset);
            }
        }
        Ok(assets)
    }

    fn rasterize_and_upload(&self, composite: &CompositeRange) -> Result<Option<RasterAsset>> {
        let key = composite.key;
        let Some((grid, mask)) = burn(&composite.geometry, self.options.pixel, self.options.containment)
        else {
            warn!(%key, "composite range has empty geometry, skipping");
            return Ok(None);
        };

        if mask.iter().all(|&v| v == OUTSIDE) {
            warn!(%key, "composite range covers no pixel centres at this resolution");
        }

        // Transient 8-bit GeoTIFF, recompressed to a packed 1-bit mask.
        let uncompressed = self
            .options
            .work_dir
            .join(format!("{}_uncompressed.tif", key.asset_name()));
        write_mask_u8(&uncompressed, &grid, &mask, None)?;
        let (grid, values) = read_mask_u8(&uncompressed)?;
        let packed = PackedMask::from_u8(grid, &values)?;
        fs::remove_file(&uncompressed)?;

        let asset = RasterAsset::new(key, composite.sci_name.clone(), &self.options.collection);
        let bytes = self.store.put_mask(&asset.asset_id, &packed)?;

        let labels = self.labels.to_labels();
        metrics::counter!(metric_defs::BYTES_UPLOADED.name, &labels).increment(bytes);
        metrics::counter!(
            metric_defs::COMPOSITES_RASTERIZED.name,
            &self.labels.with(&[("breeding", key.breeding.to_string())])
        )
        .increment(1);

        info!(
            %key,
            sci_name = %composite.sci_name,
            asset_id = %asset.asset_id,
            width = grid.width,
            height = grid.height,
            pixels = packed.count(),
            "uploaded range mask"
        );
        Ok(Some(asset))
    }
}

impl std::fmt::Debug for ChunkedDissolveRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedDissolveRasterizer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
