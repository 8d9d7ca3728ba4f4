//! Common components used by every grid-placed entity.

use serde::{Deserialize, Serialize};
use stationatmos_logic::Direction;

/// Integer grid tile coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring tile one step in `direction`.
    pub fn offset(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// The four cardinal neighbours, in `Direction::ALL` order.
    pub fn neighbors(self) -> [TilePos; 4] {
        Direction::ALL.map(|d| self.offset(d))
    }
}

/// Where an entity sits on the grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub tile: TilePos,
}

impl Position {
    pub fn new(tile: TilePos) -> Self {
        Self { tile }
    }
}

/// Clockwise quarter turns applied to an entity's pipe directions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rotation(pub i32);

/// Marker: the entity is fixed to the grid and its pipes may connect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchored;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_are_adjacent() {
        let origin = TilePos::new(3, -2);
        for n in origin.neighbors() {
            assert_eq!((n.x - origin.x).abs() + (n.y - origin.y).abs(), 1);
        }
        assert_eq!(origin.offset(Direction::North), TilePos::new(3, -1));
    }
}
