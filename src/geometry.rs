// src/geometry.rs
//
// Planar polygon math for the occupancy grid. The grid only needs three
// capabilities — area, centroid, and intersection area against an
// axis-aligned cell rectangle — so they live behind `GeometryBackend` and
// the clipping implementation can be swapped without touching grid logic.

/// Quadrilateral (or general simple polygon) in ground-plane meters.
/// Vertex winding may be either direction; areas are reported unsigned.
#[derive(Debug, Clone)]
pub struct GroundPolygon {
    pub vertices: Vec<[f64; 2]>,
}

impl GroundPolygon {
    pub fn new(vertices: Vec<[f64; 2]>) -> Self {
        Self { vertices }
    }

    /// Axis-aligned bounds as (min_x, min_y, max_x, max_y).
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for v in &self.vertices {
            min_x = min_x.min(v[0]);
            min_y = min_y.min(v[1]);
            max_x = max_x.max(v[0]);
            max_y = max_y.max(v[1]);
        }
        (min_x, min_y, max_x, max_y)
    }
}

/// Axis-aligned cell rectangle in ground-plane meters.
#[derive(Debug, Clone, Copy)]
pub struct CellRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

pub trait GeometryBackend {
    /// Unsigned polygon area.
    fn area(&self, polygon: &GroundPolygon) -> f64;

    /// Vertex-average centroid. Good enough for cell lookup on the
    /// near-convex quads that bbox projection produces.
    fn centroid(&self, polygon: &GroundPolygon) -> Option<[f64; 2]>;

    /// Unsigned area of the polygon clipped to the rectangle.
    fn intersection_area(&self, polygon: &GroundPolygon, rect: CellRect) -> f64;
}

/// Default backend: shoelace area plus Sutherland–Hodgman clipping against
/// the four half-planes of the cell rectangle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SutherlandHodgman;

impl GeometryBackend for SutherlandHodgman {
    fn area(&self, polygon: &GroundPolygon) -> f64 {
        shoelace(&polygon.vertices).abs()
    }

    fn centroid(&self, polygon: &GroundPolygon) -> Option<[f64; 2]> {
        let n = polygon.vertices.len();
        if n == 0 {
            return None;
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for v in &polygon.vertices {
            cx += v[0];
            cy += v[1];
        }
        Some([cx / n as f64, cy / n as f64])
    }

    fn intersection_area(&self, polygon: &GroundPolygon, rect: CellRect) -> f64 {
        let mut clipped = polygon.vertices.clone();
        clipped = clip_halfplane(&clipped, |p| p[0] - rect.min_x); // x >= min_x
        clipped = clip_halfplane(&clipped, |p| rect.max_x - p[0]); // x <= max_x
        clipped = clip_halfplane(&clipped, |p| p[1] - rect.min_y); // y >= min_y
        clipped = clip_halfplane(&clipped, |p| rect.max_y - p[1]); // y <= max_y
        shoelace(&clipped).abs()
    }
}

/// Signed shoelace area.
fn shoelace(vertices: &[[f64; 2]]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        sum += a[0] * b[1] - b[0] * a[1];
    }
    sum * 0.5
}

/// Clip a polygon against one half-plane. `inside` returns >= 0 for points
/// kept. Standard Sutherland–Hodgman edge walk.
fn clip_halfplane<F>(vertices: &[[f64; 2]], inside: F) -> Vec<[f64; 2]>
where
    F: Fn(&[f64; 2]) -> f64,
{
    if vertices.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(vertices.len() + 1);
    for i in 0..vertices.len() {
        let cur = vertices[i];
        let prev = vertices[(i + vertices.len() - 1) % vertices.len()];
        let d_cur = inside(&cur);
        let d_prev = inside(&prev);

        if d_cur >= 0.0 {
            if d_prev < 0.0 {
                out.push(intersect_edge(prev, cur, d_prev, d_cur));
            }
            out.push(cur);
        } else if d_prev >= 0.0 {
            out.push(intersect_edge(prev, cur, d_prev, d_cur));
        }
    }
    out
}

fn intersect_edge(a: [f64; 2], b: [f64; 2], d_a: f64, d_b: f64) -> [f64; 2] {
    let t = d_a / (d_a - d_b);
    [a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])]
}
