//! Chunked rasterization against a directory-backed raster store.

use std::sync::Arc;

use forestloss_common::{Breeding, SisId, SpeciesKey};
use forestloss_range::{
    AttributeTable, ChunkedDissolveRasterizer, ContainmentRule, ForestDependency, MemorySource,
    RangeError, RasterizerOptions, VectorRecord,
};
use forestloss_raster::{DirectoryRasterStore, PixelSize, RasterStore};
use geo::{polygon, MultiPolygon};

fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x, y: y),
        (x: x + size, y: y),
        (x: x + size, y: y + size),
        (x: x, y: y + size),
        (x: x, y: y),
    ]])
}

fn record(sisid: u64, seasonal: u8, x: f64) -> VectorRecord {
    VectorRecord {
        sisid: SisId(sisid),
        sci_name: format!("Species number{sisid}"),
        geometry: square(x, 0.0, 1.0),
        presence: 1,
        origin: 1,
        seasonal,
    }
}

fn records() -> Vec<VectorRecord> {
    vec![
        record(1, 1, 0.0),
        record(1, 2, 1.0),
        record(2, 2, 0.0),
        record(3, 3, 0.0),
        record(3, 3, 2.0),
        record(3, 1, 4.0),
        record(4, 1, 0.0), // Low dependency, filtered out
        record(5, 2, 0.0),
    ]
}

fn attributes() -> AttributeTable {
    AttributeTable::from_pairs([
        (SisId(1), ForestDependency::High),
        (SisId(2), ForestDependency::Medium),
        (SisId(3), ForestDependency::High),
        (SisId(4), ForestDependency::Low),
        (SisId(5), ForestDependency::High),
    ])
}

fn rasterizer(
    dir: &std::path::Path,
    chunk_size: usize,
) -> (ChunkedDissolveRasterizer, Arc<DirectoryRasterStore>) {
    let store = Arc::new(DirectoryRasterStore::new(dir.join("store")).unwrap());
    let options = RasterizerOptions {
        pixel: PixelSize::new(0.25, 0.25).unwrap(),
        chunk_size,
        containment: ContainmentRule::PixelCentre,
        work_dir: dir.join("work"),
        collection: "ranges/test".to_string(),
    };
    let rasterizer = ChunkedDissolveRasterizer::new(options, store.clone()).unwrap();
    (rasterizer, store)
}

#[test]
fn test_full_traversal_uploads_each_composite_once() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, store) = rasterizer(dir.path(), 4);
    let source = MemorySource::new(records());

    let output = rasterizer.process(&source, &attributes(), 0).unwrap();

    let keys: Vec<String> = output.assets.iter().map(|a| a.key.to_string()).collect();
    assert_eq!(keys, vec!["1/1", "1/0", "2/1", "3/1", "3/0", "5/1"]);

    // Chunk rows partition the source.
    let ranges: Vec<(usize, usize)> = output
        .chunks
        .iter()
        .map(|c| (c.start_row, c.end_row))
        .collect();
    assert_eq!(ranges, vec![(0, 3), (3, 6), (6, 8)]);
    assert!(output.chunks.last().unwrap().is_final);
    assert_eq!(output.chunks[0].deferred, Some(SisId(3)));

    for asset in &output.assets {
        assert!(asset.asset_id.starts_with("ranges/test/"));
        assert!(store.contains(&asset.asset_id).unwrap());
    }

    // Non-breeding range of species 3 is three disjoint 1x1 squares.
    let mask = store.get_mask("ranges/test/3_0").unwrap();
    assert_eq!(mask.count(), 3 * 16);

    // Transient GeoTIFFs are removed after upload.
    let leftovers = std::fs::read_dir(dir.path().join("work")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_resume_from_reported_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, _) = rasterizer(dir.path(), 4);
    let source = MemorySource::new(records());

    let full = rasterizer.process(&source, &attributes(), 0).unwrap();
    let resume_row = full.chunks[1].start_row;

    let resumed = rasterizer.process(&source, &attributes(), resume_row).unwrap();
    assert_eq!(resumed.chunks.len(), 2);
    assert_eq!(
        resumed.assets.first().map(|a| a.key),
        Some(SpeciesKey::new(SisId(3), Breeding::Breeding))
    );
}

#[test]
fn test_species_longer_than_chunk_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, _) = rasterizer(dir.path(), 3);
    let mut rows = records();
    rows.insert(5, record(3, 2, 6.0));
    let source = MemorySource::new(rows);

    let err = rasterizer.process(&source, &attributes(), 0).unwrap_err();
    match err {
        RangeError::ResumabilityGap { start, end, sisid } => {
            assert_eq!(sisid, SisId(3));
            assert_eq!((start, end), (3, 6));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_species_run_equal_to_chunk_size() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, _) = rasterizer(dir.path(), 3);

    // Species 3 has exactly three rows and starts on a chunk boundary.
    let output = rasterizer.process(&MemorySource::new(records()), &attributes(), 0).unwrap();
    let ranges: Vec<(usize, usize)> = output.chunks.iter().map(|c| (c.start_row, c.end_row)).collect();
    assert_eq!(ranges, vec![(0, 2), (2, 3), (3, 6), (6, 8)]);
    assert_eq!(output.chunks[2].deferred, None);
    assert_eq!(output.assets.len(), 6);
}

#[test]
fn test_chunk_hook_sees_uploads_before_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, store) = rasterizer(dir.path(), 3);
    let source = MemorySource::new(vec![
        record(1, 2, 0.0),
        record(2, 2, 0.0),
        record(5, 2, 0.0),
        record(1, 2, 3.0),
        record(5, 2, 3.0),
    ]);

    let mut persisted = Vec::new();
    let mut ends = Vec::new();
    let err = rasterizer
        .process_with(&source, &attributes(), 0, |report, assets| {
            ends.push(report.end_row);
            persisted.extend_from_slice(assets);
            Ok::<(), RangeError>(())
        })
        .unwrap_err();
    assert!(matches!(err, RangeError::DuplicateComposite(_)), "{err}");

    assert_eq!(ends, vec![2]);
    let keys: Vec<String> = persisted.iter().map(|a| a.key.to_string()).collect();
    assert_eq!(keys, vec!["1/1", "2/1"]);
    for asset in &persisted {
        assert!(store.contains(&asset.asset_id).unwrap());
    }
}

#[test]
fn test_chunk_hook_error_stops_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, _) = rasterizer(dir.path(), 4);
    let source = MemorySource::new(records());

    let mut calls = 0;
    let err = rasterizer
        .process_with(&source, &attributes(), 0, |_, _| {
            calls += 1;
            Err(RangeError::InputFormat("stop".to_string()))
        })
        .unwrap_err();
    assert!(matches!(err, RangeError::InputFormat(_)));
    assert_eq!(calls, 1);
}

#[test]
fn test_ungrouped_species_across_chunks_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, _) = rasterizer(dir.path(), 3);
    let source = MemorySource::new(vec![
        record(1, 2, 0.0),
        record(2, 2, 0.0),
        record(5, 2, 0.0),
        record(1, 2, 3.0),
        record(5, 2, 3.0),
    ]);

    let err = rasterizer.process(&source, &attributes(), 0).unwrap_err();
    assert!(matches!(err, RangeError::DuplicateComposite(_)), "{err}");
}

#[test]
fn test_fully_filtered_chunk_produces_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, _) = rasterizer(dir.path(), 10);
    let source = MemorySource::new(vec![record(4, 1, 0.0), record(99, 1, 0.0)]);

    let output = rasterizer.process(&source, &attributes(), 0).unwrap();
    assert!(output.assets.is_empty());
    assert_eq!(output.chunks.len(), 1);
    assert_eq!(output.chunks[0].composites, 0);
}
