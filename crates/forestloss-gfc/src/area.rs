//! Area reduction of forest-change layers over a range mask.

use std::collections::BTreeMap;
use std::path::Path;

use forestloss_common::{LayerLabel, SpeciesKey};
use forestloss_raster::{cell_area_km2, GeoLayer, PackedMask};
use tracing::debug;

use crate::{AreaJobSpec, GfcError, Result};

/// The fixed source layers every area job reads.
#[derive(Debug, Clone)]
pub struct GfcLayers {
    /// Canopy cover at the epoch, in percent.
    pub treecover: GeoLayer,
    /// Year of loss as `year - epoch`, 0 for no loss.
    pub lossyear: GeoLayer,
    /// Elevation in metres.
    pub elevation: GeoLayer,
}

impl GfcLayers {
    /// Load the three layers from GeoTIFF files.
    pub fn from_paths(
        treecover: impl AsRef<Path>,
        lossyear: impl AsRef<Path>,
        elevation: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Self {
            treecover: GeoLayer::from_file(treecover)?,
            lossyear: GeoLayer::from_file(lossyear)?,
            elevation: GeoLayer::from_file(elevation)?,
        })
    }
}

/// One of the three conditions a pixel must meet to count towards an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Canopy cover reaches the threshold.
    ForestChange,
    /// Elevation lies inside the species' band.
    Altitude,
    /// The pixel is inside the range mask.
    Range,
}

/// Order in which conditions are evaluated by [`compute_areas`].
pub const DEFAULT_ORDER: [Condition; 3] = [Condition::ForestChange, Condition::Altitude, Condition::Range];

/// Area (km²) of every layer in `spec`, reduced over `mask`.
pub fn compute_areas(
    mask: &PackedMask,
    layers: &GfcLayers,
    spec: &AreaJobSpec,
) -> Result<BTreeMap<LayerLabel, f64>> {
    compute_areas_in_order(mask, layers, spec, DEFAULT_ORDER)
}

/// [`compute_areas`] with an explicit condition evaluation order.
///
/// The conditions are a plain conjunction, so every order gives the same areas.
pub fn compute_areas_in_order(
    mask: &PackedMask,
    layers: &GfcLayers,
    spec: &AreaJobSpec,
    order: [Condition; 3],
) -> Result<BTreeMap<LayerLabel, f64>> {
    let grid = *mask.grid();
    for layer in [&layers.treecover, &layers.lossyear, &layers.elevation] {
        grid.ensure_same_lattice(layer.grid())?;
    }

    let factor = spec.reduction.block_factor(grid.pixel.height);
    let blocks_x = grid.width.div_ceil(factor);
    let blocks_y = grid.height.div_ceil(factor);
    let pixels = blocks_x as u64 * blocks_y as u64;
    if pixels as f64 > spec.reduction.max_pixels {
        return Err(GfcError::PixelBudgetExceeded {
            key: spec.asset.key,
            pixels,
            max_pixels: spec.reduction.max_pixels,
        });
    }

    let (_, origin_lat) = grid.origin();
    let block_height = factor as f64 * grid.pixel.height;
    let block_width = factor as f64 * grid.pixel.width;
    let pixels_per_block = (factor as f64) * (factor as f64);

    let mut totals = vec![0.0; spec.layers.len()];
    let mut block = vec![0.0; spec.layers.len()];

    for block_row in 0..blocks_y {
        let south = origin_lat + block_row as f64 * block_height;
        let block_area = cell_area_km2(south, south + block_height, block_width);

        for block_col in 0..blocks_x {
            block.iter_mut().for_each(|v| *v = 0.0);

            let rows = block_row * factor..((block_row + 1) * factor).min(grid.height);
            for row in rows {
                let cols = block_col * factor..((block_col + 1) * factor).min(grid.width);
                for col in cols {
                    let mut fraction = 0.0;
                    let included = order.iter().all(|condition| match condition {
                        Condition::ForestChange => {
                            fraction = layers
                                .treecover
                                .value_at(&grid, col, row)
                                .map(|tc| spec.analysis.forest_fraction(tc as f64))
                                .unwrap_or(0.0);
                            fraction > 0.0
                        }
                        Condition::Altitude => layers
                            .elevation
                            .value_at(&grid, col, row)
                            .is_some_and(|e| spec.altitude.contains(e as f64)),
                        Condition::Range => mask.get(col, row),
                    });
                    if !included {
                        continue;
                    }

                    let lossyear = layers
                        .lossyear
                        .value_at(&grid, col, row)
                        .map(|v| v.round() as i32);
                    for (sum, layer) in block.iter_mut().zip(&spec.layers) {
                        if layer.selects(lossyear) {
                            *sum += fraction;
                        }
                    }
                }
            }

            // Block mean times block area.
            for (total, sum) in totals.iter_mut().zip(&block) {
                *total += sum / pixels_per_block * block_area;
            }
        }
    }

    log_reduction(spec.asset.key, factor, pixels);
    Ok(spec
        .layers
        .iter()
        .map(|layer| layer.label)
        .zip(totals)
        .collect())
}

fn log_reduction(key: SpeciesKey, factor: u32, pixels: u64) {
    debug!(%key, factor, pixels, "reduced forest-change layers");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compose_layers, AltitudeBand, AnalysisOptions, ReductionOptions};
    use approx::assert_relative_eq;
    use forestloss_common::{Breeding, GfcYears, RasterAsset, SisId};
    use forestloss_raster::{PixelGrid, PixelSize};

    fn grid() -> PixelGrid {
        PixelGrid::new(PixelSize::new(0.01, 0.01).unwrap(), 0, 0, 2, 2)
    }

    /// Row 0 is southernmost: values are [(0,0), (1,0), (0,1), (1,1)].
    fn layers(treecover: [f32; 4], lossyear: [f32; 4], elevation: [f32; 4]) -> GfcLayers {
        GfcLayers {
            treecover: GeoLayer::from_parts(grid(), treecover.to_vec(), None).unwrap(),
            lossyear: GeoLayer::from_parts(grid(), lossyear.to_vec(), None).unwrap(),
            elevation: GeoLayer::from_parts(grid(), elevation.to_vec(), None).unwrap(),
        }
    }

    fn spec(altitude: AltitudeBand) -> AreaJobSpec {
        let years = GfcYears::hansen(2003).unwrap();
        let key = SpeciesKey::new(SisId(1), Breeding::Breeding);
        AreaJobSpec {
            asset: RasterAsset::new(key, "Harpia harpyja", "ranges"),
            altitude,
            layers: compose_layers(&years),
            analysis: AnalysisOptions::default(),
            reduction: ReductionOptions {
                factor: Some(1),
                ..ReductionOptions::default()
            },
            export_path: "exports/1_1.csv".to_string(),
        }
    }

    fn full_mask() -> PackedMask {
        PackedMask::from_u8(grid(), &[255; 4]).unwrap()
    }

    fn pixel_area(row: u32) -> f64 {
        let g = grid();
        let px = g.pixel_bounds(0, row);
        cell_area_km2(px.min_lat, px.max_lat, g.pixel.width)
    }

    #[test]
    fn test_baseline_and_loss_areas() {
        let layers = layers([100.0, 80.0, 40.0, 60.0], [0.0, 2.0, 2.0, 3.0], [10.0; 4]);
        let areas = compute_areas(&full_mask(), &layers, &spec(AltitudeBand::FULL)).unwrap();

        // Pixel (0,1) is below the canopy threshold and contributes nothing.
        let baseline = 1.0 * pixel_area(0) + 0.8 * pixel_area(0) + 0.6 * pixel_area(1);
        assert_relative_eq!(areas[&LayerLabel::Remaining(2001)], baseline, max_relative = 1e-12);
        assert_eq!(areas[&LayerLabel::Loss(2001)], 0.0);
        assert_relative_eq!(areas[&LayerLabel::Loss(2002)], 0.8 * pixel_area(0), max_relative = 1e-12);
        assert_relative_eq!(areas[&LayerLabel::Loss(2003)], 0.6 * pixel_area(1), max_relative = 1e-12);
    }

    #[test]
    fn test_altitude_band_excludes_pixels() {
        let layers = layers([100.0; 4], [0.0; 4], [50.0, 150.0, 250.0, 100.0]);
        let band = AltitudeBand { min: 100.0, max: 200.0 };
        let areas = compute_areas(&full_mask(), &layers, &spec(band)).unwrap();

        let expected = pixel_area(0) + pixel_area(1);
        assert_relative_eq!(areas[&LayerLabel::Remaining(2001)], expected, max_relative = 1e-12);
    }

    #[test]
    fn test_range_mask_excludes_pixels() {
        let layers = layers([100.0; 4], [0.0; 4], [0.0; 4]);
        let mask = PackedMask::from_u8(grid(), &[255, 0, 0, 0]).unwrap();
        let areas = compute_areas(&mask, &layers, &spec(AltitudeBand::FULL)).unwrap();
        assert_relative_eq!(areas[&LayerLabel::Remaining(2001)], pixel_area(0), max_relative = 1e-12);
    }

    #[test]
    fn test_condition_order_commutes() {
        let layers = layers([100.0, 55.0, 30.0, 90.0], [1.0, 0.0, 3.0, 1.0], [5.0, 500.0, 50.0, 80.0]);
        let mask = PackedMask::from_u8(grid(), &[255, 255, 0, 255]).unwrap();
        let spec = spec(AltitudeBand { min: 0.0, max: 100.0 });

        use Condition::*;
        let orders = [
            [ForestChange, Altitude, Range],
            [ForestChange, Range, Altitude],
            [Altitude, ForestChange, Range],
            [Altitude, Range, ForestChange],
            [Range, ForestChange, Altitude],
            [Range, Altitude, ForestChange],
        ];
        let reference = compute_areas_in_order(&mask, &layers, &spec, orders[0]).unwrap();
        for order in &orders[1..] {
            assert_eq!(compute_areas_in_order(&mask, &layers, &spec, *order).unwrap(), reference);
        }
    }

    #[test]
    fn test_block_reduction_preserves_uniform_area() {
        let layers = layers([100.0; 4], [0.0; 4], [0.0; 4]);
        let mut spec = spec(AltitudeBand::FULL);
        let exact = compute_areas(&full_mask(), &layers, &spec).unwrap();

        spec.reduction.factor = Some(2);
        let reduced = compute_areas(&full_mask(), &layers, &spec).unwrap();
        assert_relative_eq!(
            reduced[&LayerLabel::Remaining(2001)],
            exact[&LayerLabel::Remaining(2001)],
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_pixel_budget() {
        let layers = layers([100.0; 4], [0.0; 4], [0.0; 4]);
        let mut spec = spec(AltitudeBand::FULL);
        spec.reduction.max_pixels = 3.0;
        assert!(matches!(
            compute_areas(&full_mask(), &layers, &spec),
            Err(GfcError::PixelBudgetExceeded { pixels: 4, .. })
        ));
    }

    #[test]
    fn test_lattice_mismatch() {
        let layers = layers([100.0; 4], [0.0; 4], [0.0; 4]);
        let other = PixelGrid::new(PixelSize::new(0.02, 0.02).unwrap(), 0, 0, 1, 1);
        let mask = PackedMask::from_u8(other, &[255]).unwrap();
        assert!(matches!(
            compute_areas(&mask, &layers, &spec(AltitudeBand::FULL)),
            Err(GfcError::Raster(_))
        ));
    }
}
