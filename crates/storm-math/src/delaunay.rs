// File: crates/storm-math/src/delaunay.rs
// Bowyer-Watson Delaunay triangulation over a small 2D point set, used by
// Blend2dState to turn an arbitrary set of threshold vertices into a
// triangle mesh for barycentric blend-weight queries.

use crate::Vec2;

/// A triangle as indices into the original vertex slice, always wound
/// counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub indices: [usize; 3],
}

/// Computes the Delaunay triangulation of `points` (at least 3, no
/// duplicates) via Bowyer-Watson with a super-triangle enclosing the
/// point set expanded by 20x its extent. Triangles touching a
/// super-vertex are discarded before returning. The result is sorted by
/// the triangle's centroid angle around the overall centroid so it is
/// deterministic regardless of insertion order or tie-breaking in the
/// sweep.
pub fn triangulate(points: &[Vec2]) -> Vec<Triangle> {
    if points.len() < 3 {
        return Vec::new();
    }

    let (min, max) = bounds(points);
    let size = (max - min).max(Vec2::splat(1.0));
    let center = (min + max) * 0.5;
    let radius = size.length() * 20.0;

    // Super-triangle vertices appended after the real points.
    let super_a = center + Vec2::new(0.0, radius * 2.0);
    let super_b = center + Vec2::new(-radius * 2.0, -radius);
    let super_c = center + Vec2::new(radius * 2.0, -radius);

    let mut verts: Vec<Vec2> = points.to_vec();
    let super_base = verts.len();
    verts.push(super_a);
    verts.push(super_b);
    verts.push(super_c);

    let mut triangles: Vec<[usize; 3]> = vec![[super_base, super_base + 1, super_base + 2]];

    for point_index in 0..points.len() {
        let p = verts[point_index];
        let mut bad: Vec<usize> = Vec::new();
        for (i, tri) in triangles.iter().enumerate() {
            if in_circumcircle(&verts, *tri, p) {
                bad.push(i);
            }
        }

        // Polygon boundary: edges of bad triangles not shared by another bad triangle.
        let mut polygon: Vec<(usize, usize)> = Vec::new();
        for &bi in &bad {
            let tri = triangles[bi];
            for edge in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let shared = bad.iter().any(|&bj| {
                    bj != bi && edge_in_triangle(triangles[bj], edge)
                });
                if !shared {
                    polygon.push(edge);
                }
            }
        }

        // Remove bad triangles (descending index to keep indices valid while removing).
        let mut bad_sorted = bad.clone();
        bad_sorted.sort_unstable_by(|a, b| b.cmp(a));
        for bi in bad_sorted {
            triangles.remove(bi);
        }

        for (a, b) in polygon {
            triangles.push([a, b, point_index]);
        }
    }

    // Drop triangles touching a super-vertex.
    triangles.retain(|tri| tri.iter().all(|&i| i < super_base));

    // Wind CCW and sort deterministically by centroid angle.
    let mut triangles: Vec<Triangle> = triangles
        .into_iter()
        .map(|tri| Triangle { indices: wind_ccw(points, tri) })
        .collect();

    let overall_center = points.iter().fold(Vec2::ZERO, |acc, p| acc + *p) / points.len() as f32;
    triangles.sort_by(|a, b| {
        let ca = triangle_centroid(points, a.indices) - overall_center;
        let cb = triangle_centroid(points, b.indices) - overall_center;
        let angle_a = ca.y.atan2(ca.x);
        let angle_b = cb.y.atan2(cb.x);
        angle_a
            .partial_cmp(&angle_b)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.indices.cmp(&b.indices))
    });

    triangles
}

fn bounds(points: &[Vec2]) -> (Vec2, Vec2) {
    let mut min = points[0];
    let mut max = points[0];
    for p in &points[1..] {
        min = min.min(*p);
        max = max.max(*p);
    }
    (min, max)
}

fn edge_in_triangle(tri: [usize; 3], edge: (usize, usize)) -> bool {
    let edges = [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])];
    edges.iter().any(|&(a, b)| (a == edge.0 && b == edge.1) || (a == edge.1 && b == edge.0))
}

fn in_circumcircle(verts: &[Vec2], tri: [usize; 3], p: Vec2) -> bool {
    let [a, b, c] = [verts[tri[0]], verts[tri[1]], verts[tri[2]]];
    let ax = a.x - p.x;
    let ay = a.y - p.y;
    let bx = b.x - p.x;
    let by = b.y - p.y;
    let cx = c.x - p.x;
    let cy = c.y - p.y;

    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);

    // Sign of det depends on the triangle's winding; normalize by area sign.
    let area2 = (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y);
    if area2 > 0.0 {
        det > 0.0
    } else {
        det < 0.0
    }
}

fn wind_ccw(points: &[Vec2], tri: [usize; 3]) -> [usize; 3] {
    let [a, b, c] = [points[tri[0]], points[tri[1]], points[tri[2]]];
    let area2 = (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y);
    if area2 < 0.0 {
        [tri[0], tri[2], tri[1]]
    } else {
        tri
    }
}

fn triangle_centroid(points: &[Vec2], tri: [usize; 3]) -> Vec2 {
    (points[tri[0]] + points[tri[1]] + points[tri[2]]) / 3.0
}

/// Barycentric coordinates of `p` with respect to triangle `(a, b, c)`.
pub fn barycentric(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> (f32, f32, f32) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < f32::EPSILON {
        return (1.0, 0.0, 0.0);
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;
    (u, v, w)
}

/// True when all barycentric weights are non-negative (within tolerance).
pub fn barycentric_inside(weights: (f32, f32, f32)) -> bool {
    const EPS: f32 = 1e-5;
    weights.0 >= -EPS && weights.1 >= -EPS && weights.2 >= -EPS
}

/// Projects `p` onto the closest point of segment `a-b`, returned as a
/// parametric `t` in `[0, 1]` (0 = a, 1 = b).
pub fn project_on_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.dot(ab);
    if len2 <= f32::EPSILON {
        return 0.0;
    }
    ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangulates_a_quad() {
        let pts = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let tris = triangulate(&pts);
        assert_eq!(tris.len(), 2);
        for tri in &tris {
            for &i in &tri.indices {
                assert!(i < pts.len());
            }
        }
    }

    #[test]
    fn barycentric_sums_to_one_inside() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(1.0, 0.0);
        let c = Vec2::new(0.0, 1.0);
        let p = Vec2::new(0.25, 0.25);
        let (u, v, w) = barycentric(p, a, b, c);
        assert!((u + v + w - 1.0).abs() < 1e-5);
        assert!(barycentric_inside((u, v, w)));
    }

    #[test]
    fn outside_point_has_negative_weight() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(1.0, 0.0);
        let c = Vec2::new(0.0, 1.0);
        let p = Vec2::new(1.0, 1.0);
        let weights = barycentric(p, a, b, c);
        assert!(!barycentric_inside(weights));
    }

    #[test]
    fn segment_projection_clamps() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(1.0, 0.0);
        assert_eq!(project_on_segment(Vec2::new(-1.0, 0.0), a, b), 0.0);
        assert_eq!(project_on_segment(Vec2::new(2.0, 0.0), a, b), 1.0);
        assert!((project_on_segment(Vec2::new(0.5, 1.0), a, b) - 0.5).abs() < 1e-5);
    }
}
