//! Sparse spatial index of grid cells.
//!
//! World space is cut into square cells of `grid_size` units. Cells are
//! grouped into 8x8 blocks, and only blocks holding at least one occupied
//! cell are allocated. A lookup is one hash probe on the block coordinate
//! followed by direct indexing into the block.

use std::collections::HashMap;

use lattice_core::math::Vec2;
use lattice_core::profiling::profile_function;
use lattice_render::InstanceBuffer;

use crate::batch::{PreparePool, UploadStats};
use crate::coord::{BLOCK_SIZE, CellRange, Coord, CoordBuildHasher};
use crate::error::{PrepareError, UploadResultExt};
use crate::pool::{GroupKey, OpaquePool, TranslucentPool};
use crate::sprite::{RenderClass, SpriteHandle, SpriteStore};

const CELLS_PER_BLOCK: usize = BLOCK_SIZE * BLOCK_SIZE;

/// The sprites of one grid square, split into three render pools.
#[derive(Debug)]
pub struct GridCell<B> {
    pub(crate) standard: OpaquePool<B>,
    pub(crate) statics: OpaquePool<B>,
    pub(crate) translucent: TranslucentPool<B>,
    pub(crate) occluded_frames: u32,
}

impl<B> GridCell<B> {
    pub fn new() -> Self {
        Self {
            standard: OpaquePool::new(),
            statics: OpaquePool::new(),
            translucent: TranslucentPool::new(),
            occluded_frames: 0,
        }
    }

    pub(crate) fn insert(
        &mut self,
        handle: SpriteHandle,
        class: RenderClass,
        key: GroupKey,
        store: &SpriteStore,
    ) {
        match class {
            RenderClass::Standard => self.standard.insert(handle, key),
            RenderClass::Static => self.statics.insert(handle, key),
            RenderClass::Translucent => self.translucent.insert(handle, store),
        }
    }

    pub(crate) fn remove(&mut self, handle: SpriteHandle, class: RenderClass, key: GroupKey) -> bool {
        match class {
            RenderClass::Standard => self.standard.remove(handle, key),
            RenderClass::Static => self.statics.remove(handle, key),
            RenderClass::Translucent => self.translucent.remove(handle),
        }
    }

    pub(crate) fn mark_dirty(&mut self, class: RenderClass, key: GroupKey) {
        match class {
            RenderClass::Standard => self.standard.mark_dirty(key),
            RenderClass::Static => self.statics.mark_dirty(key),
            RenderClass::Translucent => self.translucent.mark_dirty(),
        }
    }

    /// Release every batch in the cell, keeping its sprites.
    pub fn deactivate(&mut self) {
        self.standard.deactivate();
        self.statics.deactivate();
        self.translucent.deactivate();
    }

    pub fn standard(&self) -> &OpaquePool<B> {
        &self.standard
    }

    pub fn statics(&self) -> &OpaquePool<B> {
        &self.statics
    }

    pub fn translucent(&self) -> &TranslucentPool<B> {
        &self.translucent
    }

    /// Opaque pool for `class`; `None` for translucent.
    pub fn opaque(&self, class: RenderClass) -> Option<&OpaquePool<B>> {
        match class {
            RenderClass::Standard => Some(&self.standard),
            RenderClass::Static => Some(&self.statics),
            RenderClass::Translucent => None,
        }
    }

    /// GC passes since the cell was last visible.
    pub fn occluded_frames(&self) -> u32 {
        self.occluded_frames
    }

    /// Whether any pool holds, or is about to hold, GPU batches.
    pub fn is_active(&self) -> bool {
        self.standard.is_active() || self.statics.is_active() || self.translucent.is_active()
    }

    pub fn is_empty(&self) -> bool {
        self.standard.is_empty() && self.statics.is_empty() && self.translucent.is_empty()
    }

    pub fn sprite_count(&self) -> usize {
        self.standard.len() + self.statics.len() + self.translucent.len()
    }
}

impl<B: InstanceBuffer> GridCell<B> {
    /// Upload every dirty pool of the cell.
    pub fn prepare(
        &mut self,
        coord: Coord,
        store: &SpriteStore,
        device: &B::Device,
    ) -> Result<UploadStats, PrepareError> {
        let mut stats = UploadStats::default();
        stats += self
            .standard
            .prepare_pool(store, device)
            .upload_context(|| format!("{} pool of cell {}", RenderClass::Standard, coord))?;
        stats += self
            .statics
            .prepare_pool(store, device)
            .upload_context(|| format!("{} pool of cell {}", RenderClass::Static, coord))?;
        stats += self
            .translucent
            .prepare_pool(store, device)
            .upload_context(|| format!("{} pool of cell {}", RenderClass::Translucent, coord))?;
        Ok(stats)
    }
}

impl<B> Default for GridCell<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// An 8x8 group of cells, allocated as a unit.
#[derive(Debug)]
struct GridBlock<B> {
    cells: [Option<GridCell<B>>; CELLS_PER_BLOCK],
}

impl<B> GridBlock<B> {
    fn new() -> Box<Self> {
        Box::new(Self {
            cells: std::array::from_fn(|_| None),
        })
    }

    fn slot(coord: Coord) -> usize {
        let (lx, ly) = coord.local();
        ly * BLOCK_SIZE + lx
    }

    fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }
}

/// Maps world positions to grid cells.
#[derive(Debug)]
pub struct SpatialIndex<B> {
    grid_size: Vec2,
    blocks: HashMap<Coord, Box<GridBlock<B>>, CoordBuildHasher>,
    cell_count: usize,
}

impl<B> SpatialIndex<B> {
    /// # Panics
    ///
    /// Panics unless both axes of `grid_size` are positive and finite.
    pub fn new(grid_size: Vec2) -> Self {
        assert!(
            grid_size.is_finite() && grid_size.cmpgt(Vec2::ZERO).all(),
            "grid size must be positive and finite, got {grid_size}"
        );
        Self {
            grid_size,
            blocks: HashMap::default(),
            cell_count: 0,
        }
    }

    pub fn grid_size(&self) -> Vec2 {
        self.grid_size
    }

    /// Cell whose `[coord * grid_size, (coord + 1) * grid_size)` square holds `position`.
    pub fn coord_of(&self, position: Vec2) -> Coord {
        let cell = (position / self.grid_size).floor();
        Coord::new(cell.x as i32, cell.y as i32)
    }

    /// World-space minimum corner of a cell.
    pub fn cell_origin(&self, coord: Coord) -> Vec2 {
        Vec2::new(coord.x as f32, coord.y as f32) * self.grid_size
    }

    pub fn cell_at(&self, position: Vec2) -> Option<&GridCell<B>> {
        self.cell(self.coord_of(position))
    }

    pub fn cell(&self, coord: Coord) -> Option<&GridCell<B>> {
        self.blocks
            .get(&coord.block())
            .and_then(|block| block.cells[GridBlock::<B>::slot(coord)].as_ref())
    }

    pub fn cell_mut(&mut self, coord: Coord) -> Option<&mut GridCell<B>> {
        self.blocks
            .get_mut(&coord.block())
            .and_then(|block| block.cells[GridBlock::<B>::slot(coord)].as_mut())
    }

    /// The cell at `coord`, creating it and its block if needed.
    pub fn ensure_cell(&mut self, coord: Coord) -> &mut GridCell<B> {
        let block = self.blocks.entry(coord.block()).or_insert_with(|| {
            tracing::debug!("Allocated grid block {}", coord.block());
            GridBlock::new()
        });

        let slot = &mut block.cells[GridBlock::<B>::slot(coord)];
        if slot.is_none() {
            tracing::debug!("Created grid cell {}", coord);
            self.cell_count += 1;
        }
        slot.get_or_insert_with(GridCell::new)
    }

    /// Erase the cell at `coord` if it holds no sprites.
    ///
    /// The block stays allocated until [`compact_blocks`](Self::compact_blocks).
    pub fn remove_cell_if_empty(&mut self, coord: Coord) -> bool {
        let Some(block) = self.blocks.get_mut(&coord.block()) else {
            return false;
        };
        let slot = &mut block.cells[GridBlock::<B>::slot(coord)];
        if !slot.as_ref().is_some_and(GridCell::is_empty) {
            return false;
        }
        *slot = None;
        self.cell_count -= 1;
        tracing::debug!("Erased empty grid cell {}", coord);
        true
    }

    /// Free each listed block whose cells are all empty. Returns the number freed.
    pub fn compact_blocks(&mut self, blocks: impl IntoIterator<Item = Coord>) -> usize {
        profile_function!();
        let mut removed = 0;
        for block in blocks {
            if self.blocks.get(&block).is_some_and(|b| b.is_empty()) {
                self.blocks.remove(&block);
                tracing::debug!("Freed grid block {}", block);
                removed += 1;
            }
        }
        removed
    }

    /// Visit every existing cell inside `range`, stopping at the first error.
    ///
    /// Each overlapping block is probed once. When the range spans more
    /// blocks than exist, the block table is scanned instead.
    pub fn try_for_each_cell_in<E>(
        &mut self,
        range: CellRange,
        mut f: impl FnMut(Coord, &mut GridCell<B>) -> Result<(), E>,
    ) -> Result<(), E> {
        let block_range = range.blocks();

        let mut visit = |block_coord: Coord, block: &mut GridBlock<B>| -> Result<(), E> {
            for (slot, cell) in block.cells.iter_mut().enumerate() {
                let Some(cell) = cell else { continue };
                let coord =
                    Coord::from_block_local(block_coord, slot % BLOCK_SIZE, slot / BLOCK_SIZE);
                if range.contains(coord) {
                    f(coord, cell)?;
                }
            }
            Ok(())
        };

        if block_range.area() > self.blocks.len() as u64 {
            for (&block_coord, block) in self.blocks.iter_mut() {
                if block_range.contains(block_coord) {
                    visit(block_coord, block)?;
                }
            }
        } else {
            for by in block_range.min.y..=block_range.max.y {
                for bx in block_range.min.x..=block_range.max.x {
                    let block_coord = Coord::new(bx, by);
                    if let Some(block) = self.blocks.get_mut(&block_coord) {
                        visit(block_coord, block)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Visit every existing cell inside `range`.
    pub fn for_each_cell_in(&mut self, range: CellRange, mut f: impl FnMut(Coord, &mut GridCell<B>)) {
        let _ = self.try_for_each_cell_in(range, |coord, cell| {
            f(coord, cell);
            Ok::<_, std::convert::Infallible>(())
        });
    }

    /// Every existing cell, in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = (Coord, &GridCell<B>)> + '_ {
        self.blocks.iter().flat_map(|(&block_coord, block)| {
            block.cells.iter().enumerate().filter_map(move |(slot, cell)| {
                cell.as_ref().map(|cell| {
                    let coord =
                        Coord::from_block_local(block_coord, slot % BLOCK_SIZE, slot / BLOCK_SIZE);
                    (coord, cell)
                })
            })
        })
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Index = SpatialIndex<()>;

    #[test]
    fn test_coord_of_floors_negative_positions() {
        let index = Index::new(Vec2::splat(32.0));
        assert_eq!(index.coord_of(Vec2::new(10.0, 10.0)), Coord::new(0, 0));
        assert_eq!(index.coord_of(Vec2::new(-0.5, 32.0)), Coord::new(-1, 1));
        assert_eq!(index.coord_of(Vec2::new(-32.0, -32.5)), Coord::new(-1, -2));
    }

    #[test]
    #[should_panic(expected = "grid size must be positive and finite")]
    fn test_zero_grid_size_rejected() {
        let _ = Index::new(Vec2::new(0.0, 16.0));
    }

    #[test]
    fn test_ensure_and_erase_cell() {
        let mut index = Index::new(Vec2::splat(16.0));
        let coord = Coord::new(-3, 9);
        index.ensure_cell(coord);
        index.ensure_cell(coord);
        assert_eq!(index.cell_count(), 1);
        assert_eq!(index.block_count(), 1);
        assert!(index.cell_at(Vec2::new(-40.0, 150.0)).is_some());

        assert!(index.remove_cell_if_empty(coord));
        assert_eq!(index.cell_count(), 0);
        assert_eq!(index.block_count(), 1);

        assert_eq!(index.compact_blocks([coord.block()]), 1);
        assert_eq!(index.block_count(), 0);
    }

    #[test]
    fn test_compaction_keeps_occupied_blocks() {
        let mut index = Index::new(Vec2::splat(16.0));
        index.ensure_cell(Coord::new(0, 0));
        index.ensure_cell(Coord::new(7, 7));
        index.remove_cell_if_empty(Coord::new(0, 0));

        assert_eq!(index.compact_blocks([Coord::new(0, 0)]), 0);
        assert!(index.cell(Coord::new(7, 7)).is_some());
    }

    #[test]
    fn test_for_each_cell_in_range() {
        let mut index = Index::new(Vec2::splat(16.0));
        for coord in [(-9, 0), (-1, -1), (0, 0), (8, 8), (40, 40)] {
            index.ensure_cell(Coord::new(coord.0, coord.1));
        }
        let range = CellRange {
            min: Coord::new(-9, -1),
            max: Coord::new(8, 7),
        };

        let mut seen = Vec::new();
        index.for_each_cell_in(range, |coord, _| seen.push(coord));
        seen.sort();
        assert_eq!(
            seen,
            vec![Coord::new(-1, -1), Coord::new(-9, 0), Coord::new(0, 0)]
        );
    }

    #[test]
    fn test_huge_range_scans_table() {
        let mut index = Index::new(Vec2::splat(1.0));
        index.ensure_cell(Coord::new(1_000_000, -1_000_000));
        let range = CellRange {
            min: Coord::new(i32::MIN, i32::MIN),
            max: Coord::new(i32::MAX, i32::MAX),
        };

        let mut count = 0;
        index
            .try_for_each_cell_in(range, |_, _| {
                count += 1;
                Ok::<_, ()>(())
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_cells_reports_coordinates() {
        let mut index = Index::new(Vec2::splat(16.0));
        index.ensure_cell(Coord::new(-1, 12));
        let coords: Vec<_> = index.cells().map(|(coord, _)| coord).collect();
        assert_eq!(coords, vec![Coord::new(-1, 12)]);
    }
}
