use std::collections::{HashMap, HashSet};

use crate::world::direction::Direction;

pub const DEFAULT_MAX_ITERATIONS: usize = 500;

/// A node in one planner invocation. Parents are indices into the arena.
#[derive(Debug, Clone, Copy)]
struct PathNode {
    row: i64,
    col: i64,
    g: i64,
    h: i64,
    f: i64,
    parent: Option<usize>,
}

fn heuristic(row: i64, col: i64, row_end: i64, col_end: i64) -> i64 {
    (row - row_end).abs() + (col - col_end).abs()
}

/// A* search over the unbounded grid with unit step cost and eight-way moves.
///
/// `cost(row, col)` returns 0 for a walkable cell and anything else for a
/// blocked one. With `range`, the search stops at the first expanded node whose
/// Manhattan distance to the goal is within it. An empty path means no route
/// was found inside `max_iterations` expansions.
pub fn a_star<E>(
    start: (i64, i64),
    goal: (i64, i64),
    mut cost: impl FnMut(i64, i64) -> Result<u8, E>,
    range: Option<i64>,
    max_iterations: usize,
) -> Result<Vec<Direction>, E> {
    let (row_end, col_end) = goal;
    let mut nodes: Vec<PathNode> = Vec::new();
    // Indices into `nodes`, kept sorted by f with insertion order among ties.
    let mut open: Vec<usize> = Vec::new();
    let mut open_index: HashMap<(i64, i64), usize> = HashMap::new();
    let mut closed: HashSet<(i64, i64)> = HashSet::new();

    let h = heuristic(start.0, start.1, row_end, col_end);
    nodes.push(PathNode {
        row: start.0,
        col: start.1,
        g: 0,
        h,
        f: h,
        parent: None,
    });
    open.push(0);
    open_index.insert(start, 0);

    let mut iterations = 0;
    while !open.is_empty() && iterations < max_iterations {
        iterations += 1;
        open.sort_by_key(|&i| nodes[i].f);
        let current_idx = open.remove(0);
        let current = nodes[current_idx];
        open_index.remove(&(current.row, current.col));

        if (current.row, current.col) == goal {
            return Ok(reconstruct_path(&nodes, current_idx));
        }
        if let Some(range) = range {
            if heuristic(current.row, current.col, row_end, col_end) <= range {
                return Ok(reconstruct_path(&nodes, current_idx));
            }
        }

        closed.insert((current.row, current.col));

        for direction in Direction::PLANAR {
            let (dr, dc) = direction.vector();
            let key = (current.row + dr, current.col + dc);
            if closed.contains(&key) || cost(key.0, key.1)? != 0 {
                continue;
            }
            let g = current.g + 1;

            match open_index.get(&key) {
                Some(&idx) => {
                    let node = &mut nodes[idx];
                    if g < node.g {
                        node.g = g;
                        node.f = g + node.h;
                        node.parent = Some(current_idx);
                    }
                }
                None => {
                    let h = heuristic(key.0, key.1, row_end, col_end);
                    nodes.push(PathNode {
                        row: key.0,
                        col: key.1,
                        g,
                        h,
                        f: g + h,
                        parent: Some(current_idx),
                    });
                    let idx = nodes.len() - 1;
                    open.push(idx);
                    open_index.insert(key, idx);
                }
            }
        }
    }

    Ok(Vec::new())
}

fn reconstruct_path(nodes: &[PathNode], mut idx: usize) -> Vec<Direction> {
    let mut path = Vec::new();
    while let Some(parent_idx) = nodes[idx].parent {
        let node = nodes[idx];
        let parent = nodes[parent_idx];
        if let Some(d) = Direction::from_vector(node.row - parent.row, node.col - parent.col) {
            path.push(d);
        }
        idx = parent_idx;
    }
    path.reverse();
    path
}

/// Apply `path` to `start`, returning the cell it ends on.
pub fn walk(start: (i64, i64), path: &[Direction]) -> (i64, i64) {
    path.iter().fold(start, |(r, c), d| {
        let (dr, dc) = d.vector();
        (r + dr, c + dc)
    })
}
