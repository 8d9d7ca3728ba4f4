//! Cardinal directions and pipe connection masks.

use serde::{Deserialize, Serialize};

/// One of the four grid directions a pipe end can face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Grid offset one step in this direction (north is +y).
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::South => (0, -1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Rotate clockwise by `quarter_turns` (may be negative).
    pub fn rotated(self, quarter_turns: i32) -> Direction {
        // Clockwise order starting at north.
        const ORDER: [Direction; 4] = [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ];
        let start = ORDER.iter().position(|&d| d == self).unwrap_or(0) as i32;
        ORDER[(start + quarter_turns).rem_euclid(4) as usize]
    }

    fn bit(self) -> u8 {
        match self {
            Direction::North => 1,
            Direction::South => 2,
            Direction::East => 4,
            Direction::West => 8,
        }
    }
}

/// Set of directions a pipe node connects toward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipeDirection(u8);

impl PipeDirection {
    pub const NONE: Self = Self(0);
    pub const NORTH: Self = Self(1);
    pub const SOUTH: Self = Self(2);
    pub const EAST: Self = Self(4);
    pub const WEST: Self = Self(8);

    pub const LONGITUDINAL: Self = Self(1 | 2);
    pub const LATERAL: Self = Self(4 | 8);

    pub const NORTH_EAST: Self = Self(1 | 4);
    pub const NORTH_WEST: Self = Self(1 | 8);
    pub const SOUTH_EAST: Self = Self(2 | 4);
    pub const SOUTH_WEST: Self = Self(2 | 8);

    pub const T_NORTH: Self = Self(1 | 4 | 8);
    pub const T_SOUTH: Self = Self(2 | 4 | 8);
    pub const T_EAST: Self = Self(1 | 2 | 4);
    pub const T_WEST: Self = Self(1 | 2 | 8);

    pub const FOURWAY: Self = Self(1 | 2 | 4 | 8);

    pub fn from_directions(directions: &[Direction]) -> Self {
        Self(directions.iter().fold(0, |acc, d| acc | d.bit()))
    }

    pub fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Directions present in this mask, in `Direction::ALL` order.
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |&d| self.contains(d))
    }

    pub fn rotated(self, quarter_turns: i32) -> Self {
        Self(
            self.directions()
                .fold(0, |acc, d| acc | d.rotated(quarter_turns).bit()),
        )
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}
