//! Camera culling and garbage collection of occluded cells.
//!
//! A cell moves through three states: visible, occluded for a number of GC
//! passes, and deactivated once that number passes the threshold. A
//! deactivated cell keeps its sprites but no GPU batches, and uploads again
//! when it comes back into view.

use lattice_core::alloc::HashSet;
use lattice_core::math::{Affine2, Rect, Vec2};
use lattice_core::profiling::profile_function;
use lattice_render::is_invertible;

use crate::coord::{CellRange, Coord};
use crate::error::PrepareError;
use crate::grid::SpatialIndex;

const NDC_CORNERS: [Vec2; 4] = [
    Vec2::new(-1.0, -1.0),
    Vec2::new(1.0, -1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(-1.0, 1.0),
];

/// Cells covered by the viewport of a world-to-NDC `view` transform,
/// widened by `margin` cells on every side. Negative margins count as zero.
pub fn visible_range(view: &Affine2, grid_size: Vec2, margin: i32) -> Result<CellRange, PrepareError> {
    let margin = margin.max(0);
    if !is_invertible(view) {
        return Err(PrepareError::SingularView);
    }
    let inverse = view.inverse();
    let bounds = Rect::from_points(NDC_CORNERS.map(|corner| inverse.transform_point2(corner)))
        .ok_or(PrepareError::SingularView)?;

    let min = (bounds.min / grid_size).floor();
    let max = (bounds.max / grid_size).floor();
    if !min.is_finite() || !max.is_finite() {
        return Err(PrepareError::SingularView);
    }

    Ok(CellRange {
        min: Coord::new(min.x as i32, min.y as i32).offset(-margin, -margin),
        max: Coord::new(max.x as i32, max.y as i32).offset(margin, margin),
    })
}

/// Result of a garbage collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Cells whose batches were released this pass.
    pub deactivated_cells: usize,
    /// Tracked cells that no longer existed.
    pub forgotten_cells: usize,
    /// Empty blocks freed.
    pub freed_blocks: usize,
    /// Empty allocator buckets released.
    pub released_buckets: usize,
}

/// Tracks which cells were drawn and how long the others have been out of view.
#[derive(Debug, Default)]
pub struct Visibility {
    /// Cells prepared by the last successful frame, in row-major order.
    visible: Vec<Coord>,
    occluded: HashSet<Coord>,
    pending_compaction: HashSet<Coord>,
}

impl Visibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible set with the cells prepared this frame.
    ///
    /// Cells that dropped out of view start (or continue) occlusion
    /// tracking; cells in view stop it and their counters reset.
    pub fn commit_frame<B>(&mut self, mut visible: Vec<Coord>, index: &mut SpatialIndex<B>) {
        profile_function!();
        visible.sort_unstable();

        for coord in &self.visible {
            if visible.binary_search(coord).is_err() {
                self.occluded.insert(*coord);
            }
        }
        for coord in &visible {
            self.occluded.remove(coord);
            if let Some(cell) = index.cell_mut(*coord) {
                cell.occluded_frames = 0;
            }
        }
        self.visible = visible;
    }

    /// Handle a frame that failed after some cells were prepared.
    ///
    /// The committed visible set stays as it was. Prepared cells outside it
    /// may now hold batches, so they start occlusion tracking and age out
    /// like any other cell unless a later frame shows them.
    pub fn track_failed_frame<B>(&mut self, touched: &[Coord], index: &mut SpatialIndex<B>) {
        for &coord in touched {
            if self.is_visible(coord) || !self.occluded.insert(coord) {
                continue;
            }
            if let Some(cell) = index.cell_mut(coord) {
                cell.occluded_frames = 0;
            }
        }
    }

    /// Check `block` for removal on the next pass.
    pub fn queue_compaction(&mut self, block: Coord) {
        self.pending_compaction.insert(block);
    }

    /// Age occluded cells, deactivating those out of view for more than
    /// `threshold` passes, then free queued empty blocks.
    pub fn collect<B>(&mut self, index: &mut SpatialIndex<B>, threshold: u32) -> GcStats {
        profile_function!();
        let mut stats = GcStats::default();

        self.occluded.retain(|coord| match index.cell_mut(*coord) {
            None => {
                stats.forgotten_cells += 1;
                false
            }
            Some(cell) => {
                cell.occluded_frames = cell.occluded_frames.saturating_add(1);
                if cell.occluded_frames > threshold {
                    cell.deactivate();
                    tracing::debug!(
                        "Deactivated cell {} after {} occluded frames",
                        coord,
                        cell.occluded_frames
                    );
                    stats.deactivated_cells += 1;
                    false
                } else {
                    true
                }
            }
        });

        stats.freed_blocks = index.compact_blocks(self.pending_compaction.drain());
        stats
    }

    /// Cells prepared by the last successful frame, in row-major order.
    pub fn visible(&self) -> &[Coord] {
        &self.visible
    }

    pub fn is_visible(&self, coord: Coord) -> bool {
        self.visible.binary_search(&coord).is_ok()
    }

    /// Number of cells currently tracked as out of view.
    pub fn occluded_count(&self) -> usize {
        self.occluded.len()
    }

    pub fn is_occluded(&self, coord: Coord) -> bool {
        self.occluded.contains(&coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_view_covers_unit_square() {
        let range = visible_range(&Affine2::IDENTITY, Vec2::splat(1.0), 0).unwrap();
        assert_eq!(range.min, Coord::new(-1, -1));
        assert_eq!(range.max, Coord::new(1, 1));
    }

    #[test]
    fn test_margin_widens_range() {
        // NDC [-1, 1] spans world [0, 64] on both axes.
        let view = Affine2::from_scale_angle_translation(Vec2::splat(1.0 / 32.0), 0.0, Vec2::splat(-1.0));
        let range = visible_range(&view, Vec2::splat(32.0), 1).unwrap();
        assert_eq!(range.min, Coord::new(-1, -1));
        assert_eq!(range.max, Coord::new(3, 3));
    }

    #[test]
    fn test_singular_view_rejected() {
        let view = Affine2::from_scale(Vec2::new(1.0, 0.0));
        assert_eq!(
            visible_range(&view, Vec2::splat(1.0), 1),
            Err(PrepareError::SingularView)
        );
    }

    #[test]
    fn test_commit_tracks_cells_leaving_view() {
        let mut index = SpatialIndex::<()>::new(Vec2::splat(1.0));
        let a = Coord::new(0, 0);
        let b = Coord::new(1, 0);
        index.ensure_cell(a);
        index.ensure_cell(b);

        let mut visibility = Visibility::new();
        visibility.commit_frame(vec![b, a], &mut index);
        assert_eq!(visibility.visible(), &[a, b]);

        visibility.commit_frame(vec![b], &mut index);
        assert!(visibility.is_occluded(a));
        assert!(!visibility.is_visible(a));

        visibility.collect(&mut index, 5);
        assert_eq!(index.cell(a).unwrap().occluded_frames(), 1);

        visibility.commit_frame(vec![a, b], &mut index);
        assert!(!visibility.is_occluded(a));
        assert_eq!(index.cell(a).unwrap().occluded_frames(), 0);
    }

    #[test]
    fn test_failed_frame_tracks_prepared_cells() {
        let mut index = SpatialIndex::<()>::new(Vec2::splat(1.0));
        let shown = Coord::new(0, 0);
        let partial = Coord::new(4, 0);
        index.ensure_cell(shown);
        index.ensure_cell(partial);

        let mut visibility = Visibility::new();
        visibility.commit_frame(vec![shown], &mut index);
        visibility.track_failed_frame(&[shown, partial], &mut index);

        assert_eq!(visibility.visible(), &[shown]);
        assert!(!visibility.is_occluded(shown));
        assert!(visibility.is_occluded(partial));

        // Already tracked cells keep aging.
        visibility.collect(&mut index, 5);
        visibility.track_failed_frame(&[partial], &mut index);
        assert_eq!(index.cell(partial).unwrap().occluded_frames(), 1);
    }

    #[test]
    fn test_extreme_margins() {
        let range = visible_range(&Affine2::IDENTITY, Vec2::splat(1.0), i32::MAX).unwrap();
        assert_eq!(range.min, Coord::new(i32::MIN, i32::MIN));
        assert_eq!(range.max, Coord::new(i32::MAX, i32::MAX));

        let range = visible_range(&Affine2::IDENTITY, Vec2::splat(1.0), i32::MIN).unwrap();
        assert_eq!(range.min, Coord::new(-1, -1));
        assert_eq!(range.max, Coord::new(1, 1));
    }

    #[test]
    fn test_collect_forgets_erased_cells() {
        let mut index = SpatialIndex::<()>::new(Vec2::splat(1.0));
        let a = Coord::new(2, 2);
        index.ensure_cell(a);

        let mut visibility = Visibility::new();
        visibility.commit_frame(vec![a], &mut index);
        visibility.commit_frame(Vec::new(), &mut index);
        index.remove_cell_if_empty(a);
        visibility.queue_compaction(a.block());

        let stats = visibility.collect(&mut index, 0);
        assert_eq!(stats.forgotten_cells, 1);
        assert_eq!(stats.freed_blocks, 1);
        assert_eq!(visibility.occluded_count(), 0);
    }
}
