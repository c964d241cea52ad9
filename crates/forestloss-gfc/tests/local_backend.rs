//! Area jobs end to end on the local backend, with GeoTIFF layers on disk.

use std::path::Path;
use std::sync::Arc;

use approx::assert_relative_eq;
use forestloss_common::{Breeding, GfcYears, LayerLabel, RasterAsset, SisId, SpeciesKey};
use forestloss_gfc::{
    load_export_records, AltitudeTable, AnalysisOptions, ComputeBackend, DirectoryObjectStore, GfcLayers,
    JobState, LocalBackend, ObjectStore, ReductionOptions, RemoteJobOrchestrator,
};
use forestloss_raster::{cell_area_km2, DirectoryRasterStore, GeoLayer, PackedMask, PixelGrid, PixelSize, RasterStore};

const PIXEL: f64 = 0.25;

fn pixel() -> PixelSize {
    PixelSize::new(PIXEL, PIXEL).unwrap()
}

fn row_area(row: i64) -> f64 {
    let south = row as f64 * PIXEL;
    cell_area_km2(south, south + PIXEL, PIXEL)
}

/// A 4x4 world: full cover, loss in 2001 at (1, 1), a mountain at (2, 2).
fn write_layers(dir: &Path) -> GfcLayers {
    let grid = PixelGrid::new(pixel(), 0, 0, 4, 4);
    let mut lossyear = vec![0.0; 16];
    lossyear[grid.index(1, 1)] = 1.0;
    let mut elevation = vec![100.0; 16];
    elevation[grid.index(2, 2)] = 5000.0;

    let paths = [dir.join("treecover.tif"), dir.join("lossyear.tif"), dir.join("elevation.tif")];
    GeoLayer::from_parts(grid, vec![100.0; 16], None).unwrap().write(&paths[0]).unwrap();
    GeoLayer::from_parts(grid, lossyear, None).unwrap().write(&paths[1]).unwrap();
    GeoLayer::from_parts(grid, elevation, None).unwrap().write(&paths[2]).unwrap();

    GfcLayers::from_paths(&paths[0], &paths[1], &paths[2]).unwrap()
}

struct Fixture {
    _dir: tempfile::TempDir,
    orchestrator: RemoteJobOrchestrator,
    rasters: Arc<DirectoryRasterStore>,
    objects: Arc<DirectoryObjectStore>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let layers = write_layers(dir.path());
    let rasters = Arc::new(DirectoryRasterStore::new(dir.path().join("assets")).unwrap());
    let objects = Arc::new(DirectoryObjectStore::new(dir.path().join("objects")).unwrap());
    let backend = Arc::new(LocalBackend::new(layers, rasters.clone(), objects.clone()));
    let orchestrator = RemoteJobOrchestrator::new(
        backend,
        GfcYears::hansen(2002).unwrap(),
        AnalysisOptions::default(),
        ReductionOptions::default(),
    )
    .with_run_id("test-run");
    Fixture {
        _dir: dir,
        orchestrator,
        rasters,
        objects,
    }
}

fn upload(store: &dyn RasterStore, key: SpeciesKey, sci_name: &str) -> RasterAsset {
    let grid = PixelGrid::new(pixel(), 1, 1, 2, 2);
    let mask = PackedMask::from_u8(grid, &[255; 4]).unwrap();
    let asset = RasterAsset::new(key, sci_name, "ranges");
    store.put_mask(&asset.asset_id, &mask).unwrap();
    asset
}

fn altitude() -> AltitudeTable {
    AltitudeTable::from_reader("name,min,max,source\nHarpia harpyja,0,1000,test\n".as_bytes()).unwrap()
}

#[test]
fn test_jobs_export_area_records() {
    let fx = fixture();
    let breeding = upload(fx.rasters.as_ref(), SpeciesKey::new(SisId(1), Breeding::Breeding), "Harpia harpyja");
    let resident = upload(fx.rasters.as_ref(), SpeciesKey::new(SisId(2), Breeding::Breeding), "Strix varia");

    let jobs = fx
        .orchestrator
        .submit_area_jobs(&[breeding, resident], &altitude(), "exports/test-run")
        .unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].export_path, "exports/test-run/1_1.csv");

    let summary = fx.orchestrator.await_all(&jobs).unwrap();
    assert!(summary.outcomes.iter().all(|o| o.state == JobState::Completed));
    assert!(summary.failures().is_empty());

    let records = load_export_records(fx.objects.as_ref(), "exports/test-run").unwrap();
    assert_eq!(records.len(), 2);

    // The altitude band excludes the mountain pixel for species 1 only.
    let limited = &records[0];
    assert_eq!(limited.sisid, SisId(1));
    assert_relative_eq!(
        limited.areas[&LayerLabel::Remaining(2001)],
        2.0 * row_area(1) + row_area(2),
        max_relative = 1e-9
    );
    assert_relative_eq!(limited.areas[&LayerLabel::Loss(2001)], row_area(1), max_relative = 1e-9);
    assert_eq!(limited.areas[&LayerLabel::Loss(2002)], 0.0);

    let unlimited = &records[1];
    assert_eq!(unlimited.sci_name, "Strix varia");
    assert_relative_eq!(
        unlimited.areas[&LayerLabel::Remaining(2001)],
        2.0 * row_area(1) + 2.0 * row_area(2),
        max_relative = 1e-9
    );
}

#[test]
fn test_failed_job_is_reported_not_fatal() {
    let fx = fixture();
    let present = upload(fx.rasters.as_ref(), SpeciesKey::new(SisId(1), Breeding::Breeding), "Harpia harpyja");
    let missing = RasterAsset::new(SpeciesKey::new(SisId(9), Breeding::NonBreeding), "Ghost species", "ranges");

    let jobs = fx
        .orchestrator
        .submit_area_jobs(&[present, missing], &altitude(), "exports")
        .unwrap();
    let summary = fx.orchestrator.await_all(&jobs).unwrap();

    assert_eq!(summary.completed().count(), 1);
    let failures = summary.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].job.asset.key.sisid, SisId(9));
    assert!(failures[0].to_string().contains("Ghost species"));

    let exported = fx.objects.list("exports").unwrap();
    assert_eq!(exported, vec!["exports/1_1.csv".to_string()]);
}

#[test]
fn test_duplicate_assets_rejected() {
    let fx = fixture();
    let asset = upload(fx.rasters.as_ref(), SpeciesKey::new(SisId(1), Breeding::Breeding), "Harpia harpyja");
    assert!(fx
        .orchestrator
        .submit_area_jobs(&[asset.clone(), asset], &altitude(), "exports")
        .is_err());
}

/// Serves no masks: reading one panics.
struct BrokenRasterStore;

impl RasterStore for BrokenRasterStore {
    fn put_mask(&self, _asset_id: &str, _mask: &PackedMask) -> forestloss_raster::Result<u64> {
        Ok(0)
    }

    fn get_mask(&self, asset_id: &str) -> forestloss_raster::Result<PackedMask> {
        panic!("mask {asset_id} is unreadable")
    }

    fn contains(&self, _asset_id: &str) -> forestloss_raster::Result<bool> {
        Ok(true)
    }
}

#[test]
fn test_panicking_job_marked_failed() {
    let dir = tempfile::tempdir().unwrap();
    let layers = write_layers(dir.path());
    let objects = Arc::new(DirectoryObjectStore::new(dir.path().join("objects")).unwrap());
    let backend = Arc::new(LocalBackend::new(layers, Arc::new(BrokenRasterStore), objects));
    let orchestrator = RemoteJobOrchestrator::new(
        backend.clone(),
        GfcYears::hansen(2002).unwrap(),
        AnalysisOptions::default(),
        ReductionOptions::default(),
    );

    let asset = RasterAsset::new(SpeciesKey::new(SisId(1), Breeding::Breeding), "Harpia harpyja", "ranges");
    let jobs = orchestrator.submit_area_jobs(&[asset], &altitude(), "exports").unwrap();
    let id = jobs[0].id.clone();

    let worker = {
        let backend = backend.clone();
        let id = id.clone();
        std::thread::spawn(move || backend.wait(&id))
    };
    assert!(worker.join().is_err());

    // Later waiters see a terminal state instead of blocking on a running job.
    let status = backend.wait(&id).unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert!(status.error.unwrap().contains("panicked"));
    assert!(backend.list_active().unwrap().is_empty());
}
