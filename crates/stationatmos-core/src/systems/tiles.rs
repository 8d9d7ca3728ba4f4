//! Tile equalization - open-air diffusion between neighbouring tiles.

use crate::components::TilePos;
use crate::grid::GridAtmosphere;
use stationatmos_logic::Direction;

fn open_neighbours(grid: &GridAtmosphere, pos: TilePos) -> usize {
    pos.neighbors()
        .iter()
        .filter(|n| grid.get_tile(**n).is_some())
        .count()
}

/// Share gas across every pair of adjacent simulated tiles, once per pair.
///
/// Each tile is paired with its east and north neighbours so no pair is
/// visited twice. The share divisor uses the larger neighbour count of the
/// two tiles, which keeps a tile from giving away more than it has in one
/// pass. Returns the moles moved.
pub fn equalize_tiles(grid: &mut GridAtmosphere) -> f32 {
    let positions = grid.simulated_tiles();

    let mut moved = 0.0;
    for pos in positions {
        for direction in [Direction::East, Direction::North] {
            let other = pos.offset(direction);
            if grid.get_tile(other).is_none() {
                continue;
            }
            let adjacent = open_neighbours(grid, pos).max(open_neighbours(grid, other));

            let Some(mut a) = grid.take_tile_air(pos) else {
                continue;
            };
            let Some(mut b) = grid.take_tile_air(other) else {
                grid.return_tile_air(pos, a);
                continue;
            };
            moved += a.share(&mut b, adjacent);
            grid.return_tile_air(pos, a);
            grid.return_tile_air(other, b);
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use stationatmos_logic::constants::{CELL_VOLUME, T20C};
    use stationatmos_logic::{Gas, GasMixture};

    #[test]
    fn test_row_of_tiles_converges_and_conserves() {
        let mut grid = GridAtmosphere::new();
        for x in 0..5 {
            let air = GasMixture::new(CELL_VOLUME).with_temperature(T20C);
            let air = if x == 0 { air.with_moles(Gas::Nitrogen, 500.0) } else { air };
            grid.set_tile(TilePos::new(x, 0), air);
        }
        let total = grid.total_moles();

        for _ in 0..200 {
            equalize_tiles(&mut grid);
        }

        assert!((grid.total_moles() - total).abs() < 1e-2);
        for x in 0..5 {
            let moles = grid.get_tile(TilePos::new(x, 0)).map(|t| t.total_moles());
            assert!((moles.unwrap_or(0.0) - 100.0).abs() < 1.0);
        }
    }

    #[test]
    fn test_blocked_tiles_do_not_share() {
        let mut grid = GridAtmosphere::new();
        let full = GasMixture::standard_air(CELL_VOLUME, T20C);
        grid.set_tile(TilePos::new(0, 0), full.clone());
        grid.set_tile(TilePos::new(1, 0), full);
        grid.set_tile(TilePos::new(2, 0), GasMixture::new(CELL_VOLUME));
        grid.set_airblocked(TilePos::new(1, 0), true);

        let moved = equalize_tiles(&mut grid);

        assert_eq!(moved, 0.0);
        let empty = grid.get_tile(TilePos::new(2, 0)).map(|t| t.total_moles());
        assert_eq!(empty, Some(0.0));
    }
}
