use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use glam::Vec2;

use super::response::CornerDescriptor;
use crate::util::axis_angle_diff;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Down,
    Up,
}

impl NeighborDirection {
    const ALL: [NeighborDirection; 4] = [
        NeighborDirection::Right,
        NeighborDirection::Left,
        NeighborDirection::Down,
        NeighborDirection::Up,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn opposite(self) -> NeighborDirection {
        match self {
            NeighborDirection::Right => NeighborDirection::Left,
            NeighborDirection::Left => NeighborDirection::Right,
            NeighborDirection::Down => NeighborDirection::Up,
            NeighborDirection::Up => NeighborDirection::Down,
        }
    }

    fn step(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Down => (0, 1),
            NeighborDirection::Up => (0, -1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridParams {
    /// Tolerance on orientation and edge-angle tests, radians.
    pub angle_tolerance: f32,
    /// Nearest candidates examined per corner.
    pub neighbors: usize,
    pub min_spacing: f32,
    /// A link longer than this multiple of the corner's shortest valid link is dropped.
    pub max_spacing_ratio: f32,
    /// Candidates kept, as a multiple of the expected corner count.
    pub max_candidates_factor: usize,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            angle_tolerance: 25f32.to_radians(),
            neighbors: 8,
            min_spacing: 5.0,
            max_spacing_ratio: 2.5,
            max_candidates_factor: 6,
        }
    }
}

/// Dominant bright-diagonal angle, averaged modulo pi/2 and weighted by strength.
fn dominant_orientation(corners: &[CornerDescriptor]) -> f32 {
    let (s, c) = corners.iter().fold((0f32, 0f32), |(s, c), k| {
        (
            s + k.strength * (4.0 * k.orientation).sin(),
            c + k.strength * (4.0 * k.orientation).cos(),
        )
    });
    0.25 * s.atan2(c)
}

fn is_grid_neighbor(
    corner: &CornerDescriptor,
    neighbor: &CornerDescriptor,
    params: &GridParams,
) -> bool {
    let tol = params.angle_tolerance;
    // Adjacent corners of a chessboard have swapped colors, so their diagonals are orthogonal.
    if (axis_angle_diff(corner.orientation, neighbor.orientation) - FRAC_PI_2).abs() > tol {
        return false;
    }
    let e = neighbor.position - corner.position;
    let edge_angle = e.y.atan2(e.x);
    (axis_angle_diff(edge_angle, corner.orientation) - FRAC_PI_4).abs() <= tol
        && (axis_angle_diff(edge_angle, neighbor.orientation) - FRAC_PI_4).abs() <= tol
}

/// For each corner, the closest valid neighbor along each grid direction.
fn build_links(
    corners: &[CornerDescriptor],
    axis_u: Vec2,
    axis_v: Vec2,
    params: &GridParams,
) -> Vec<[Option<usize>; 4]> {
    corners
        .iter()
        .enumerate()
        .map(|(i, corner)| {
            let mut by_distance: Vec<(usize, f32)> = corners
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, n)| (j, n.position.distance(corner.position)))
                .filter(|(_, d)| *d >= params.min_spacing)
                .collect();
            by_distance.sort_by(|a, b| a.1.total_cmp(&b.1));
            by_distance.truncate(params.neighbors);

            let mut best: [Option<(usize, f32)>; 4] = [None; 4];
            for (j, dist) in by_distance {
                if !is_grid_neighbor(corner, &corners[j], params) {
                    continue;
                }
                let e = corners[j].position - corner.position;
                let (du, dv) = (e.dot(axis_u), e.dot(axis_v));
                let dir = if du.abs() >= dv.abs() {
                    if du > 0.0 {
                        NeighborDirection::Right
                    } else {
                        NeighborDirection::Left
                    }
                } else if dv > 0.0 {
                    NeighborDirection::Down
                } else {
                    NeighborDirection::Up
                };
                let slot = &mut best[dir.index()];
                if slot.is_none_or(|(_, d)| dist < d) {
                    *slot = Some((j, dist));
                }
            }
            let shortest = best
                .iter()
                .flatten()
                .map(|(_, d)| *d)
                .fold(f32::INFINITY, f32::min);
            best.map(|b| {
                b.filter(|(_, d)| *d <= params.max_spacing_ratio * shortest)
                    .map(|(j, _)| j)
            })
        })
        .collect()
}

/// Labels the component containing `seed` with integer grid coordinates.
/// Returns `None` when two corners claim the same cell or one corner two cells.
fn label_component(
    seed: usize,
    links: &[[Option<usize>; 4]],
    visited: &mut [bool],
) -> Option<HashMap<(i32, i32), usize>> {
    let mut coords: HashMap<usize, (i32, i32)> = HashMap::new();
    let mut cells: HashMap<(i32, i32), usize> = HashMap::new();
    let mut queue = VecDeque::new();
    coords.insert(seed, (0, 0));
    cells.insert((0, 0), seed);
    queue.push_back(seed);
    visited[seed] = true;
    let mut consistent = true;

    while let Some(node) = queue.pop_front() {
        let (a, b) = coords[&node];
        for dir in NeighborDirection::ALL {
            let Some(j) = links[node][dir.index()] else {
                continue;
            };
            let (di, dj) = dir.step();
            let expected = (a + di, b + dj);
            match coords.get(&j) {
                Some(&c) if c != expected => consistent = false,
                Some(_) => {}
                None => {
                    if cells.contains_key(&expected) {
                        consistent = false;
                        continue;
                    }
                    coords.insert(j, expected);
                    cells.insert(expected, j);
                    visited[j] = true;
                    queue.push_back(j);
                }
            }
        }
    }
    consistent.then_some(cells)
}

/// Finds the unique fully populated `width x height` window of labeled cells.
fn find_window(
    cells: &HashMap<(i32, i32), usize>,
    width: usize,
    height: usize,
) -> Option<(i32, i32)> {
    let min_a = cells.keys().map(|k| k.0).min()?;
    let max_a = cells.keys().map(|k| k.0).max()?;
    let min_b = cells.keys().map(|k| k.1).min()?;
    let max_b = cells.keys().map(|k| k.1).max()?;
    let (w, h) = (width as i32, height as i32);
    let mut found = None;
    for a0 in min_a..=(max_a - w + 1) {
        for b0 in min_b..=(max_b - h + 1) {
            let full = (0..h).all(|r| (0..w).all(|c| cells.contains_key(&(a0 + c, b0 + r))));
            if full {
                if found.is_some() {
                    return None;
                }
                found = Some((a0, b0));
            }
        }
    }
    found
}

/// Reorders a row-major grid so that columns x rows is right-handed in the
/// image (y down) and rows run downwards.
fn normalize_grid(grid: &mut Vec<Vec2>, rows: usize, cols: usize) {
    let at = |g: &Vec<Vec2>, r: usize, c: usize| g[r * cols + c];
    let col_dir = |g: &Vec<Vec2>| -> Vec2 {
        (0..rows)
            .flat_map(|r| (0..cols - 1).map(move |c| (r, c)))
            .map(|(r, c)| at(g, r, c + 1) - at(g, r, c))
            .sum()
    };
    let row_dir = |g: &Vec<Vec2>| -> Vec2 {
        (0..rows - 1)
            .flat_map(|r| (0..cols).map(move |c| (r, c)))
            .map(|(r, c)| at(g, r + 1, c) - at(g, r, c))
            .sum()
    };

    if col_dir(grid).perp_dot(row_dir(grid)) < 0.0 {
        *grid = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r, cols - 1 - c)))
            .map(|(r, c)| at(grid, r, c))
            .collect();
    }
    if row_dir(grid).y < 0.0 {
        grid.reverse();
    }
}

/// Assembles ChESS candidates into the `rows x cols` inner-corner grid.
///
/// Returns the corners in row-major order, or `None` if no connected set of
/// candidates forms exactly the requested pattern.
pub fn assemble_grid(
    candidates: &[CornerDescriptor],
    rows: usize,
    cols: usize,
    params: &GridParams,
) -> Option<Vec<Vec2>> {
    let needed = rows * cols;
    if candidates.len() < needed {
        log::trace!("grid: {} candidates, need {}", candidates.len(), needed);
        return None;
    }
    let mut ranked = candidates.to_vec();
    ranked.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    ranked.truncate(needed * params.max_candidates_factor.max(1));

    let theta0 = dominant_orientation(&ranked);
    let corners: Vec<CornerDescriptor> = ranked
        .into_iter()
        .filter(|c| {
            let d = axis_angle_diff(c.orientation, theta0);
            d.min(FRAC_PI_2 - d) <= params.angle_tolerance
        })
        .collect();
    if corners.len() < needed {
        return None;
    }

    let axis = theta0 + FRAC_PI_4;
    let axis_u = Vec2::new(axis.cos(), axis.sin());
    let axis_v = axis_u.perp();
    let raw_links = build_links(&corners, axis_u, axis_v, params);
    let links: Vec<[Option<usize>; 4]> = raw_links
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let mut mutual = [None; 4];
            for dir in NeighborDirection::ALL {
                if let Some(j) = l[dir.index()] {
                    if raw_links[j][dir.opposite().index()] == Some(i) {
                        mutual[dir.index()] = Some(j);
                    }
                }
            }
            mutual
        })
        .collect();

    let mut visited = vec![false; corners.len()];
    for seed in 0..corners.len() {
        if visited[seed] || links[seed].iter().all(Option::is_none) {
            continue;
        }
        let Some(cells) = label_component(seed, &links, &mut visited) else {
            continue;
        };
        if cells.len() < needed {
            continue;
        }
        let layout = find_window(&cells, cols, rows)
            .map(|origin| (origin, false))
            .or_else(|| find_window(&cells, rows, cols).map(|origin| (origin, true)));
        let Some(((a0, b0), transposed)) = layout else {
            continue;
        };
        let mut grid: Vec<Vec2> = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r as i32, c as i32)))
            .map(|(r, c)| {
                let key = if transposed {
                    (a0 + r, b0 + c)
                } else {
                    (a0 + c, b0 + r)
                };
                corners[cells[&key]].position
            })
            .collect();
        normalize_grid(&mut grid, rows, cols);
        return Some(grid);
    }
    None
}
