//! Grid and block coordinates.

use std::hash::{BuildHasherDefault, Hasher};

/// Cells per block edge, as a shift.
pub const BLOCK_SHIFT: u32 = 3;
/// Cells per block edge.
pub const BLOCK_SIZE: usize = 1 << BLOCK_SHIFT;
const BLOCK_MASK: i32 = BLOCK_SIZE as i32 - 1;

/// Integer coordinate of a grid cell, or of a block of cells.
///
/// Ordered row-major: by `y`, then by `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate of the block containing this cell.
    ///
    /// Arithmetic shifts floor, so `-1` lands in block `-1`.
    pub const fn block(self) -> Coord {
        Coord::new(self.x >> BLOCK_SHIFT, self.y >> BLOCK_SHIFT)
    }

    /// Position of this cell within its block, each axis in `0..BLOCK_SIZE`.
    pub const fn local(self) -> (usize, usize) {
        ((self.x & BLOCK_MASK) as usize, (self.y & BLOCK_MASK) as usize)
    }

    /// Inverse of [`Coord::block`] + [`Coord::local`].
    pub const fn from_block_local(block: Coord, lx: usize, ly: usize) -> Coord {
        Coord::new(
            (block.x << BLOCK_SHIFT) | lx as i32,
            (block.y << BLOCK_SHIFT) | ly as i32,
        )
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Coord {
        Coord::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Inclusive rectangle of cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub min: Coord,
    pub max: Coord,
}

impl CellRange {
    pub fn contains(&self, coord: Coord) -> bool {
        (self.min.x..=self.max.x).contains(&coord.x) && (self.min.y..=self.max.y).contains(&coord.y)
    }

    /// The range of blocks overlapping this range.
    pub fn blocks(&self) -> CellRange {
        CellRange {
            min: self.min.block(),
            max: self.max.block(),
        }
    }

    /// Number of coordinates covered.
    pub fn area(&self) -> u64 {
        let w = (self.max.x as i64 - self.min.x as i64 + 1).max(0) as u64;
        let h = (self.max.y as i64 - self.min.y as i64 + 1).max(0) as u64;
        w.saturating_mul(h)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Byte-wise FNV-1 hasher for block coordinates.
///
/// Block keys are two small integers; FNV-1 over their bytes is cheap and
/// spreads neighbouring blocks well enough for the block table.
#[derive(Debug, Clone, Copy)]
pub struct CoordHasher(u64);

impl Default for CoordHasher {
    fn default() -> Self {
        Self(FNV_OFFSET)
    }
}

impl Hasher for CoordHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = self.0.wrapping_mul(FNV_PRIME) ^ byte as u64;
        }
    }
}

pub type CoordBuildHasher = BuildHasherDefault<CoordHasher>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::{BuildHasher, Hash};

    #[test]
    fn test_block_decomposition_negative() {
        let coord = Coord::new(-1, -9);
        assert_eq!(coord.block(), Coord::new(-1, -2));
        assert_eq!(coord.local(), (7, 7));
        assert_eq!(Coord::from_block_local(coord.block(), 7, 7), coord);
    }

    #[test]
    fn test_block_decomposition_round_trips() {
        for y in -20..20 {
            for x in -20..20 {
                let coord = Coord::new(x, y);
                let (lx, ly) = coord.local();
                assert!(lx < BLOCK_SIZE && ly < BLOCK_SIZE);
                assert_eq!(coord.block().x, x.div_euclid(8));
                assert_eq!(lx as i32, x.rem_euclid(8));
                assert_eq!(Coord::from_block_local(coord.block(), lx, ly), coord);
            }
        }
    }

    #[test]
    fn test_row_major_order() {
        let mut coords = vec![Coord::new(1, 0), Coord::new(0, 1), Coord::new(-1, 0)];
        coords.sort();
        assert_eq!(
            coords,
            vec![Coord::new(-1, 0), Coord::new(1, 0), Coord::new(0, 1)]
        );
    }

    #[test]
    fn test_fnv1_hash_of_coord() {
        let mut expected = FNV_OFFSET;
        for byte in 3i32.to_ne_bytes().into_iter().chain((-4i32).to_ne_bytes()) {
            expected = expected.wrapping_mul(FNV_PRIME) ^ byte as u64;
        }

        let mut hasher = CoordBuildHasher::default().build_hasher();
        Coord::new(3, -4).hash(&mut hasher);
        assert_eq!(hasher.finish(), expected);
    }

    #[test]
    fn test_range_area_and_blocks() {
        let range = CellRange {
            min: Coord::new(-9, 0),
            max: Coord::new(8, 2),
        };
        assert_eq!(range.area(), 18 * 3);
        assert_eq!(range.blocks().min, Coord::new(-2, 0));
        assert_eq!(range.blocks().max, Coord::new(1, 0));
        assert!(range.contains(Coord::new(0, 2)));
        assert!(!range.contains(Coord::new(0, 3)));
    }
}
