//! # forestloss-range
//!
//! Stage one of the pipeline: turn a species range-map collection into one
//! uploaded 1-bit mask per (species, breeding subset).
//!
//! The vector source is read in chunks of rows. Each chunk is joined against
//! the forest-dependency [`AttributeTable`], filtered on forest dependency,
//! presence, origin and seasonality, split into breeding and non-breeding
//! subsets and dissolved by species. Each composite is burned into a
//! lattice-aligned mask, written to a transient GeoTIFF, recompressed into a
//! [`PackedMask`](forestloss_raster::PackedMask) and uploaded to a
//! [`RasterStore`](forestloss_raster::RasterStore).
//!
//! A chunk never splits a species: the trailing species of every non-final
//! chunk is deferred to the next one, so the chunks partition the rows
//! exactly as long as no species has more records than the chunk size.

mod attributes;
mod chunk;
mod dissolve;
mod error;
mod rasterize;
mod rasterizer;
mod record;
mod source;

pub use attributes::AttributeTable;
pub use chunk::{cut_chunk, ChunkCut};
pub use dissolve::{dissolve, passes_filters, CompositeRange};
pub use error::RangeError;
pub use rasterize::{burn, ContainmentRule, INSIDE, OUTSIDE};
pub use rasterizer::{
    ChunkReport, ChunkedDissolveRasterizer, RasterizeOutput, RasterizerOptions,
    DEFAULT_CHUNK_SIZE,
};
pub use record::{ForestDependency, VectorRecord, KEPT_ORIGIN, KEPT_PRESENCE, KEPT_SEASONAL};
pub use source::{GeoJsonSource, MemorySource, VectorSource};

/// Result type for the rasterization stage.
pub type Result<T> = std::result::Result<T, RangeError>;
