//! The scene graph: sprites, their cells and the per-frame protocol.

use lattice_core::math::{Affine2, Vec2};
use lattice_core::profiling::profile_function;
use lattice_render::{Color, InstanceBuffer, Texture, TextureArrayId, ViewSource};

use crate::batch::UploadStats;
use crate::config::SceneConfig;
use crate::coord::Coord;
use crate::error::{PrepareError, SceneError};
use crate::grid::SpatialIndex;
use crate::sprite::{RenderClass, SpriteHandle, SpriteObject, SpriteParams, SpriteStore};
use crate::visibility::{self, GcStats, Visibility};

/// Counters describing the scene graph's current state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub sprites: usize,
    pub cells: usize,
    pub blocks: usize,
    /// Cells prepared by the last successful frame.
    pub visible_cells: usize,
    /// Cells out of view and not yet deactivated.
    pub occluded_cells: usize,
    /// Buffers uploaded by the last `prepare_rendering`.
    pub uploads: usize,
    /// Instances uploaded by the last `prepare_rendering`.
    pub uploaded_instances: usize,
}

/// One uploaded batch, as handed to the renderer.
#[derive(Debug)]
pub struct DrawBatch<'a, B> {
    pub coord: Coord,
    pub class: RenderClass,
    pub texture_array: Option<TextureArrayId>,
    pub buffer: &'a B,
    pub instances: u32,
}

/// A sprite scene graph that caches render batches per grid cell.
///
/// Sprites are placed into square grid cells by their position. Each cell
/// batches its sprites into instance buffers of type `B`, re-uploading only
/// what changed. Cells that stay out of view release their buffers.
///
/// ```
/// use lattice_core::math::{Affine2, Vec2};
/// use lattice_render::StagingInstanceBuffer;
/// use lattice_scene::{SceneGraph, SpriteParams};
///
/// let mut scene = SceneGraph::<StagingInstanceBuffer>::new(Vec2::splat(32.0));
/// let sprite = scene.create_object(&SpriteParams::at(Vec2::new(10.0, 10.0))).unwrap();
///
/// scene.prepare_rendering(&(), &Affine2::IDENTITY).unwrap();
/// assert_eq!(scene.stats().uploaded_instances, 1);
///
/// scene.set_position(sprite, Vec2::new(50.0, 10.0));
/// assert_eq!(scene.sprite(sprite).cell().x, 1);
/// ```
pub struct SceneGraph<B: InstanceBuffer> {
    config: SceneConfig,
    sprites: SpriteStore,
    index: SpatialIndex<B>,
    visibility: Visibility,
    last_uploads: UploadStats,
}

impl<B: InstanceBuffer> SceneGraph<B> {
    /// # Panics
    ///
    /// Panics unless `grid_size` is positive and finite on both axes.
    pub fn new(grid_size: Vec2) -> Self {
        Self::with_config(SceneConfig::new(grid_size))
    }

    pub fn with_config(config: SceneConfig) -> Self {
        let sprites = match config.objects_per_bucket {
            Some(objects) => SpriteStore::with_bucket_capacity(objects),
            None => SpriteStore::new(),
        };
        Self {
            index: SpatialIndex::new(config.grid_size),
            sprites,
            visibility: Visibility::new(),
            last_uploads: UploadStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn create_object(&mut self, params: &SpriteParams) -> Result<SpriteHandle, SceneError> {
        profile_function!();
        let cell = self.index.coord_of(params.transform.translation);
        let object = SpriteObject::from_params(params, cell);
        let (class, key) = (object.class, object.group_key());

        let handle = SpriteHandle(self.sprites.allocate(object)?);
        self.index
            .ensure_cell(cell)
            .insert(handle, class, key, &self.sprites);
        Ok(handle)
    }

    /// Remove a sprite, returning its final state.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was already destroyed.
    pub fn destroy_object(&mut self, handle: SpriteHandle) -> SpriteObject {
        profile_function!();
        let object = self.sprites.free(handle.0);
        self.detach(handle, object.cell, object.class, object.group_key());
        object
    }

    pub fn contains(&self, handle: SpriteHandle) -> bool {
        self.sprites.contains(handle.0)
    }

    /// # Panics
    ///
    /// Panics if `handle` was destroyed.
    pub fn sprite(&self, handle: SpriteHandle) -> &SpriteObject {
        self.sprites.get(handle.0)
    }

    pub fn try_sprite(&self, handle: SpriteHandle) -> Option<&SpriteObject> {
        self.sprites.try_get(handle.0)
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    /// Move a sprite, changing cells when its translation crosses a cell edge.
    pub fn set_transform(&mut self, handle: SpriteHandle, transform: Affine2) {
        let new_cell = self.index.coord_of(transform.translation);
        let object = self.sprites.get_mut(handle.0);
        object.transform = transform;

        let old_cell = object.cell;
        let (class, key) = (object.class, object.group_key());
        if old_cell == new_cell {
            self.mark_dirty(handle);
            return;
        }

        object.cell = new_cell;
        self.detach(handle, old_cell, class, key);
        self.index
            .ensure_cell(new_cell)
            .insert(handle, class, key, &self.sprites);
    }

    pub fn set_position(&mut self, handle: SpriteHandle, position: Vec2) {
        let mut transform = self.sprites.get(handle.0).transform;
        transform.translation = position;
        self.set_transform(handle, transform);
    }

    pub fn set_tint(&mut self, handle: SpriteHandle, tint: Color) {
        self.sprites.get_mut(handle.0).tint = tint;
        self.mark_dirty(handle);
    }

    pub fn set_uv(&mut self, handle: SpriteHandle, top_left: Vec2, bottom_right: Vec2) {
        let object = self.sprites.get_mut(handle.0);
        object.uv0 = top_left;
        object.uv1 = bottom_right;
        self.mark_dirty(handle);
    }

    /// Translucent sprites are re-sorted within their cell.
    pub fn set_layer(&mut self, handle: SpriteHandle, layer: f32) {
        let object = self.sprites.get_mut(handle.0);
        object.layer = layer;
        if object.class != RenderClass::Translucent {
            self.mark_dirty(handle);
            return;
        }

        let cell = object.cell;
        if let Some(cell) = self.index.cell_mut(cell) {
            cell.translucent.resort(&self.sprites);
        }
    }

    /// Changing to a different texture array moves an opaque sprite to that group.
    pub fn set_texture(&mut self, handle: SpriteHandle, texture: Option<Texture>) {
        let object = self.sprites.get_mut(handle.0);
        let old_key = object.group_key();
        object.texture = texture;
        let new_key = object.group_key();
        let (class, coord) = (object.class, object.cell);

        if old_key == new_key || class == RenderClass::Translucent {
            self.mark_dirty(handle);
            return;
        }
        if let Some(cell) = self.index.cell_mut(coord) {
            cell.remove(handle, class, old_key);
            cell.insert(handle, class, new_key, &self.sprites);
        }
    }

    /// Upload every dirty pool in view and record which cells to draw.
    ///
    /// On error nothing that failed is marked clean and the previous
    /// frame's visible set is kept, so the next call retries.
    pub fn prepare_rendering<V: ViewSource + ?Sized>(
        &mut self,
        device: &B::Device,
        view: &V,
    ) -> Result<(), PrepareError> {
        profile_function!();
        let result = self.try_prepare(device, &view.view_transform());
        if let Err(err) = &result {
            tracing::warn!("Failed to prepare frame: {}", err);
        }
        result
    }

    fn try_prepare(&mut self, device: &B::Device, view: &Affine2) -> Result<(), PrepareError> {
        let range = visibility::visible_range(view, self.index.grid_size(), self.config.cull_margin())?;

        let sprites = &self.sprites;
        // Every cell that started uploading, including one that failed partway.
        let mut touched = Vec::new();
        let mut stats = UploadStats::default();
        let result: Result<(), PrepareError> = self.index.try_for_each_cell_in(range, |coord, cell| {
            touched.push(coord);
            stats += cell.prepare(coord, sprites, device)?;
            Ok(())
        });
        self.last_uploads = stats;

        match result {
            Ok(()) => {
                self.visibility.commit_frame(touched, &mut self.index);
                Ok(())
            }
            Err(err) => {
                self.visibility.track_failed_frame(&touched, &mut self.index);
                Err(err)
            }
        }
    }

    /// Age out-of-view cells, releasing batches of those occluded for more
    /// than `deactivate_threshold` passes, and free empty storage beyond one
    /// spare allocator bucket.
    pub fn collect_garbage(&mut self, deactivate_threshold: u32) -> GcStats {
        profile_function!();
        let mut stats = self.visibility.collect(&mut self.index, deactivate_threshold);
        // One spare bucket absorbs create/destroy churn between passes.
        stats.released_buckets = self.sprites.collect_with_reserve(1);
        stats
    }

    /// [`collect_garbage`](Self::collect_garbage) with the configured threshold.
    pub fn collect_garbage_default(&mut self) -> GcStats {
        self.collect_garbage(self.config.deactivate_threshold)
    }

    /// Walk the batches of the last prepared frame in draw order.
    ///
    /// Standard batches come first, then static, then translucent. Within
    /// each class cells are visited in row-major order; translucent runs
    /// keep their layer order.
    pub fn for_each_batch(&self, mut f: impl FnMut(DrawBatch<'_, B>)) {
        for class in RenderClass::ALL {
            for &coord in self.visibility.visible() {
                let Some(cell) = self.index.cell(coord) else {
                    continue;
                };
                let batches = match cell.opaque(class) {
                    Some(pool) => pool.batches(),
                    None => cell.translucent.batches().collect(),
                };
                for (texture_array, buffer) in batches {
                    let instances = buffer.count();
                    if instances == 0 {
                        continue;
                    }
                    f(DrawBatch {
                        coord,
                        class,
                        texture_array,
                        buffer,
                        instances,
                    });
                }
            }
        }
    }

    /// Cells prepared by the last successful frame, in row-major order.
    pub fn visible_cells(&self) -> &[Coord] {
        self.visibility.visible()
    }

    pub fn index(&self) -> &SpatialIndex<B> {
        &self.index
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            sprites: self.sprites.len(),
            cells: self.index.cell_count(),
            blocks: self.index.block_count(),
            visible_cells: self.visibility.visible().len(),
            occluded_cells: self.visibility.occluded_count(),
            uploads: self.last_uploads.batches,
            uploaded_instances: self.last_uploads.instances,
        }
    }

    fn mark_dirty(&mut self, handle: SpriteHandle) {
        let object = self.sprites.get(handle.0);
        if let Some(cell) = self.index.cell_mut(object.cell) {
            cell.mark_dirty(object.class, object.group_key());
        }
    }

    /// Take a sprite out of its cell, erasing the cell once empty.
    fn detach(&mut self, handle: SpriteHandle, coord: Coord, class: RenderClass, key: Option<TextureArrayId>) {
        if let Some(cell) = self.index.cell_mut(coord) {
            cell.remove(handle, class, key);
        }
        if self.index.remove_cell_if_empty(coord) {
            self.visibility.queue_compaction(coord.block());
        }
    }
}

impl<B: InstanceBuffer> std::fmt::Debug for SceneGraph<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_render::StagingInstanceBuffer;

    type Scene = SceneGraph<StagingInstanceBuffer>;

    fn scene() -> Scene {
        Scene::with_config(SceneConfig::new(Vec2::splat(32.0)).with_objects_per_bucket(16))
    }

    #[test]
    fn test_create_places_sprite_in_cell() {
        let mut scene = scene();
        let handle = scene
            .create_object(&SpriteParams::at(Vec2::new(-1.0, 40.0)))
            .unwrap();

        let coord = Coord::new(-1, 1);
        assert_eq!(scene.sprite(handle).cell(), coord);
        let cell = scene.index().cell(coord).unwrap();
        assert!(cell.standard().group(None).unwrap().contains(handle));
        assert!(cell.is_active());
    }

    #[test]
    fn test_texture_change_moves_group() {
        let mut scene = scene();
        let t1 = Texture::new(TextureArrayId(1), 0);
        let t2 = Texture::new(TextureArrayId(2), 4);
        let handle = scene
            .create_object(&SpriteParams::default().with_texture(t1))
            .unwrap();

        scene.set_texture(handle, Some(t2));
        let pool = scene.index().cell(Coord::new(0, 0)).unwrap().standard();
        assert!(pool.group(Some(TextureArrayId(1))).is_none());
        assert!(pool.group(Some(TextureArrayId(2))).unwrap().contains(handle));
    }

    #[test]
    fn test_same_array_texture_change_only_dirties() {
        let mut scene = scene();
        let handle = scene
            .create_object(&SpriteParams::default().with_texture(Texture::new(TextureArrayId(1), 0)))
            .unwrap();
        scene.prepare_rendering(&(), &Affine2::IDENTITY).unwrap();

        scene.set_texture(handle, Some(Texture::new(TextureArrayId(1), 3)));
        scene.prepare_rendering(&(), &Affine2::IDENTITY).unwrap();
        assert_eq!(scene.stats().uploads, 1);

        let mut layers = Vec::new();
        scene.for_each_batch(|batch| {
            layers.extend(batch.buffer.instances().iter().map(|i| i.texture_index));
        });
        assert_eq!(layers, vec![3]);
    }

    #[test]
    fn test_destroy_erases_cell() {
        let mut scene = scene();
        let handle = scene.create_object(&SpriteParams::default()).unwrap();
        let object = scene.destroy_object(handle);

        assert_eq!(object.cell(), Coord::new(0, 0));
        assert!(!scene.contains(handle));
        assert_eq!(scene.stats().cells, 0);
        assert_eq!(scene.stats().blocks, 1);

        scene.collect_garbage_default();
        assert_eq!(scene.stats().blocks, 0);
    }

    #[test]
    #[should_panic(expected = "invalid generation, use after free!")]
    fn test_stale_handle_panics() {
        let mut scene = scene();
        let handle = scene.create_object(&SpriteParams::default()).unwrap();
        scene.destroy_object(handle);
        scene.set_tint(handle, Color::RED);
    }
}
