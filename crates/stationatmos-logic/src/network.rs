//! Pipe connectivity over the tile grid.
//!
//! Pure flood fill: given pipe nodes with a tile position and a direction
//! mask, find the maximal connected groups. Two nodes connect when they sit on
//! neighbouring tiles and each faces the other. Nodes sharing a tile never
//! connect directly, so a device's inlet and outlet stay separate.

use crate::direction::{Direction, PipeDirection};
use std::collections::{HashMap, VecDeque};

/// Connectivity-relevant view of one pipe node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSpec {
    pub x: i32,
    pub y: i32,
    pub directions: PipeDirection,
    /// Disabled nodes (unanchored, disconnected ports) join nothing.
    pub enabled: bool,
}

impl NodeSpec {
    pub fn new(x: i32, y: i32, directions: PipeDirection) -> Self {
        Self {
            x,
            y,
            directions,
            enabled: true,
        }
    }
}

/// Whether `a` reaches `b` through `direction`.
fn faces(a: &NodeSpec, b: &NodeSpec, direction: Direction) -> bool {
    let (dx, dy) = direction.offset();
    a.x + dx == b.x
        && a.y + dy == b.y
        && a.directions.contains(direction)
        && b.directions.contains(direction.opposite())
}

/// True if the two nodes are directly joined.
pub fn connects(a: &NodeSpec, b: &NodeSpec) -> bool {
    a.enabled && b.enabled && a.directions.directions().any(|d| faces(a, b, d))
}

/// Partition enabled nodes into connected groups (BFS).
///
/// Every enabled node appears in exactly one group, singletons included.
/// Groups are ordered by their lowest index and members are sorted.
pub fn connected_groups(nodes: &[NodeSpec]) -> Vec<Vec<usize>> {
    let mut by_tile: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if node.enabled {
            by_tile.entry((node.x, node.y)).or_default().push(i);
        }
    }

    let mut visited = vec![false; nodes.len()];
    let mut groups = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..nodes.len() {
        if visited[start] || !nodes[start].enabled {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let mut group = Vec::new();

        while let Some(current) = queue.pop_front() {
            group.push(current);
            let node = &nodes[current];
            for direction in node.directions.directions() {
                let (dx, dy) = direction.offset();
                let Some(candidates) = by_tile.get(&(node.x + dx, node.y + dy)) else {
                    continue;
                };
                for &next in candidates {
                    if !visited[next] && faces(node, &nodes[next], direction) {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }
        }

        group.sort_unstable();
        groups.push(group);
    }

    groups
}
