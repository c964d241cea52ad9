//! Burning composite geometries into lattice-aligned 8-bit masks.

use forestloss_raster::{GridBounds, PixelGrid, PixelSize};
use geo::{coord, BoundingRect, Intersects, Line, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};

/// Mask value for pixels inside the range.
pub const INSIDE: u8 = 255;
/// Mask value for background pixels.
pub const OUTSIDE: u8 = 0;

/// Which pixels count as inside a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainmentRule {
    /// The pixel centre lies inside the geometry or on its boundary.
    #[default]
    PixelCentre,
    /// Any part of the pixel touches the geometry.
    AnyOverlap,
}

/// Slack, in pixels, within which a crossing is checked exactly.
const EDGE_TOLERANCE: f64 = 1e-9;

fn centre_inside(geometry: &MultiPolygon<f64>, grid: &PixelGrid, col: u32, row: u32) -> bool {
    let (lon, lat) = grid.pixel_centre(col, row);
    geometry.intersects(&Point::new(lon, lat))
}

fn pixel_rect(grid: &PixelGrid, col: u32, row: u32) -> Rect<f64> {
    let px = grid.pixel_bounds(col, row);
    Rect::new(
        coord! { x: px.min_lon, y: px.min_lat },
        coord! { x: px.max_lon, y: px.max_lat },
    )
}

/// Every ring segment of the geometry, exteriors and holes alike.
fn edges(geometry: &MultiPolygon<f64>) -> Vec<Line<f64>> {
    geometry
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .flat_map(|ring| ring.lines())
        .collect()
}

/// Mark pixels whose centre lies inside the geometry or on its boundary.
///
/// Each row is filled between pairs of edge crossings (even-odd), so holes
/// and disjoint parts need no special casing. Rows through a vertex, and
/// pixels whose centre sits on a crossing, are decided by an exact test.
fn fill_centres(geometry: &MultiPolygon<f64>, edges: &[Line<f64>], grid: &PixelGrid, mask: &mut [u8]) {
    let (origin_lon, _) = grid.origin();
    let width = grid.pixel.width;
    let mut crossings = Vec::new();

    for row in 0..grid.height {
        let (_, y) = grid.pixel_centre(0, row);

        if edges.iter().any(|e| e.start.y == y || e.end.y == y) {
            for col in 0..grid.width {
                if centre_inside(geometry, grid, col, row) {
                    mask[grid.index(col, row)] = INSIDE;
                }
            }
            continue;
        }

        crossings.clear();
        crossings.extend(
            edges
                .iter()
                .filter(|e| (e.start.y < y) != (e.end.y < y))
                .map(|e| e.start.x + (y - e.start.y) * (e.end.x - e.start.x) / (e.end.y - e.start.y)),
        );
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            // Fractional column indices of the crossings, measured at centres.
            let lo = (span[0] - origin_lon) / width - 0.5;
            let hi = (span[1] - origin_lon) / width - 0.5;
            let first = (lo - EDGE_TOLERANCE).ceil().max(0.0);
            let last = (hi + EDGE_TOLERANCE).floor().min(grid.width as f64 - 1.0);
            if first > last {
                continue;
            }

            for col in first as u32..=last as u32 {
                let c = col as f64;
                let clear = c > lo + EDGE_TOLERANCE && c < hi - EDGE_TOLERANCE;
                if clear || centre_inside(geometry, grid, col, row) {
                    mask[grid.index(col, row)] = INSIDE;
                }
            }
        }
    }
}

/// Mark pixels touched by any edge of the geometry.
fn mark_boundary(edges: &[Line<f64>], grid: &PixelGrid, mask: &mut [u8]) {
    let (origin_lon, origin_lat) = grid.origin();
    let (w, h) = (grid.pixel.width, grid.pixel.height);
    let clamp = |v: f64, n: u32| v.max(0.0).min(n as f64 - 1.0) as u32;

    for edge in edges {
        let rect = edge.bounding_rect();
        // A segment on a pixel edge also touches the neighbour across it.
        let col_lo = clamp(((rect.min().x - origin_lon) / w).ceil() - 1.0, grid.width);
        let col_hi = clamp(((rect.max().x - origin_lon) / w).floor(), grid.width);
        let row_lo = clamp(((rect.min().y - origin_lat) / h).ceil() - 1.0, grid.height);
        let row_hi = clamp(((rect.max().y - origin_lat) / h).floor(), grid.height);

        for row in row_lo..=row_hi {
            for col in col_lo..=col_hi {
                let index = grid.index(col, row);
                if mask[index] != INSIDE && pixel_rect(grid, col, row).intersects(edge) {
                    mask[index] = INSIDE;
                }
            }
        }
    }
}

/// Rasterize a geometry onto the smallest lattice grid covering its bounding box.
///
/// Returns `None` for an empty geometry. The mask is laid out row 0 southernmost.
pub fn burn(
    geometry: &MultiPolygon<f64>,
    pixel: PixelSize,
    rule: ContainmentRule,
) -> Option<(PixelGrid, Vec<u8>)> {
    let rect = geometry.bounding_rect()?;
    let bounds = GridBounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lon: rect.min().x,
        max_lon: rect.max().x,
    };
    let grid = PixelGrid::covering(&bounds, pixel);
    let edges = edges(geometry);

    let mut mask = vec![OUTSIDE; grid.len()];
    fill_centres(geometry, &edges, &grid, &mut mask);
    if rule == ContainmentRule::AnyOverlap {
        // A pixel overlaps the geometry iff its centre is inside or an edge touches it.
        mark_boundary(&edges, &grid, &mut mask);
    }

    Some((grid, mask))
}
