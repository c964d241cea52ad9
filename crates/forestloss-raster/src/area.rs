//! Pixel areas on the sphere.

use crate::PixelGrid;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Area in km² of a cell spanning `lon_span` degrees between latitudes `south` and `north`.
pub fn cell_area_km2(south: f64, north: f64, lon_span: f64) -> f64 {
    EARTH_RADIUS_KM
        * EARTH_RADIUS_KM
        * lon_span.to_radians()
        * (north.to_radians().sin() - south.to_radians().sin()).abs()
}

/// Area in km² of one pixel in each row of `grid`, indexed by row.
///
/// All pixels in a row share a latitude band, so the area only varies by row.
pub fn row_areas_km2(grid: &PixelGrid) -> Vec<f64> {
    (0..grid.height)
        .map(|row| {
            let px = grid.pixel_bounds(0, row);
            cell_area_km2(px.min_lat, px.max_lat, grid.pixel.width)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelSize;
    use approx::assert_relative_eq;

    #[test]
    fn test_whole_sphere() {
        let total = cell_area_km2(-90.0, 90.0, 360.0);
        let expected = 4.0 * std::f64::consts::PI * EARTH_RADIUS_KM * EARTH_RADIUS_KM;
        assert_relative_eq!(total, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_equatorial_degree() {
        // About 111.19 km on a side at the equator.
        let area = cell_area_km2(0.0, 1.0, 1.0);
        assert_relative_eq!(area, 12363.0, max_relative = 1e-3);
    }

    #[test]
    fn test_rows_shrink_towards_pole() {
        let grid = PixelGrid::new(PixelSize::new(1.0, 1.0).unwrap(), 0, 60, 1, 3);
        let areas = row_areas_km2(&grid);
        assert_eq!(areas.len(), 3);
        assert!(areas[0] > areas[1] && areas[1] > areas[2]);
    }
}
