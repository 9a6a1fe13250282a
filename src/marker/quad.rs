use std::collections::HashMap;

use glam::Vec2;

use super::union_find::UnionFind;
use crate::util::signed_area2;

/// Geometric limits for marker candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadParams {
    /// Perimeter bounds relative to the longest image side.
    pub min_perimeter_rate: f32,
    pub max_perimeter_rate: f32,
    pub min_side: f32,
    /// Quad area over convex hull area.
    pub min_fill: f32,
}

impl Default for QuadParams {
    fn default() -> Self {
        Self {
            min_perimeter_rate: 0.03,
            max_perimeter_rate: 4.0,
            min_side: 4.0,
            min_fill: 0.85,
        }
    }
}

/// Boundary pixels of every 4-connected foreground component that has at
/// least `min_pixels` pixels and does not touch the image border.
pub fn find_components(mask: &[bool], width: usize, height: usize, min_pixels: usize) -> Vec<Vec<Vec2>> {
    let mut uf = UnionFind::new(width * height);
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            if !mask[i] {
                continue;
            }
            if x > 0 && mask[i - 1] {
                uf.union(i, i - 1);
            }
            if y > 0 && mask[i - width] {
                uf.union(i, i - width);
            }
        }
    }

    struct Accum {
        boundary: Vec<Vec2>,
        touches_border: bool,
    }
    let mut components: HashMap<usize, Accum> = HashMap::new();
    let mut order: Vec<usize> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            if !mask[i] || uf.set_size(i) < min_pixels {
                continue;
            }
            let root = uf.find(i);
            let acc = components.entry(root).or_insert_with(|| {
                order.push(root);
                Accum {
                    boundary: Vec::new(),
                    touches_border: false,
                }
            });
            if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                acc.touches_border = true;
                continue;
            }
            if !mask[i - 1] || !mask[i + 1] || !mask[i - width] || !mask[i + width] {
                acc.boundary.push(Vec2::new(x as f32, y as f32));
            }
        }
    }
    order
        .into_iter()
        .filter_map(|root| components.remove(&root))
        .filter(|c| !c.touches_border)
        .map(|c| c.boundary)
        .collect()
}

/// Convex hull by the monotone chain, clockwise in the image (y down).
pub fn convex_hull(points: &[Vec2]) -> Vec<Vec2> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let mut hull: Vec<Vec2> = Vec::with_capacity(pts.len() * 2);
    for pass in 0..2 {
        let start = hull.len();
        let iter: Box<dyn Iterator<Item = &Vec2>> = if pass == 0 {
            Box::new(pts.iter())
        } else {
            Box::new(pts.iter().rev())
        };
        for &p in iter {
            while hull.len() >= start + 2
                && signed_area2(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
            {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
    }
    hull
}

pub fn polygon_area2(poly: &[Vec2]) -> f32 {
    (0..poly.len())
        .map(|i| poly[i].perp_dot(poly[(i + 1) % poly.len()]))
        .sum()
}

/// Approximates a component boundary by a convex quadrilateral.
///
/// Corners are the hull point farthest from the center, the point farthest
/// from that one, and the extreme points on either side of their diagonal.
/// The result is ordered clockwise in the image.
pub fn fit_quad(boundary: &[Vec2], min_perimeter: f32, max_perimeter: f32, params: &QuadParams) -> Option<[Vec2; 4]> {
    let hull = convex_hull(boundary);
    if hull.len() < 4 {
        return None;
    }
    let center = hull.iter().copied().sum::<Vec2>() / hull.len() as f32;
    let farthest_from = |q: Vec2| {
        hull.iter()
            .copied()
            .max_by(|a, b| a.distance_squared(q).total_cmp(&b.distance_squared(q)))
    };
    let c0 = farthest_from(center)?;
    let c2 = farthest_from(c0)?;
    let side_area = |p: &Vec2| signed_area2(c0, c2, *p);
    let c1 = hull.iter().copied().max_by(|a, b| side_area(a).total_cmp(&side_area(b)))?;
    let c3 = hull.iter().copied().min_by(|a, b| side_area(a).total_cmp(&side_area(b)))?;
    if side_area(&c1) <= 0.0 || side_area(&c3) >= 0.0 {
        return None;
    }
    let mut quad = [c0, c1, c2, c3];
    if polygon_area2(&quad) < 0.0 {
        quad = [c0, c3, c2, c1];
    }

    let perimeter: f32 = (0..4).map(|i| quad[i].distance(quad[(i + 1) % 4])).sum();
    if perimeter < min_perimeter || perimeter > max_perimeter {
        return None;
    }
    if (0..4).any(|i| quad[i].distance(quad[(i + 1) % 4]) < params.min_side) {
        return None;
    }
    if (0..4).any(|i| signed_area2(quad[i], quad[(i + 1) % 4], quad[(i + 2) % 4]) <= 0.0) {
        return None;
    }
    let hull_area = polygon_area2(&hull).abs();
    if hull_area <= 0.0 || polygon_area2(&quad) / hull_area < params.min_fill {
        return None;
    }
    Some(quad)
}
