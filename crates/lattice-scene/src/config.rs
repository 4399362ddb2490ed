use lattice_core::math::Vec2;

/// Configuration for a [`SceneGraph`](crate::SceneGraph).
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// World units covered by one grid cell on each axis.
    pub grid_size: Vec2,
    /// GC passes a cell may stay out of view before its batches are released.
    pub deactivate_threshold: u32,
    cull_margin: i32,
    /// Sprites per allocator bucket; `None` sizes buckets to 4 MiB.
    pub objects_per_bucket: Option<usize>,
}

impl SceneConfig {
    pub const DEFAULT_GRID_SIZE: f32 = 256.0;
    pub const DEFAULT_DEACTIVATE_THRESHOLD: u32 = 120;

    pub fn new(grid_size: Vec2) -> Self {
        Self {
            grid_size,
            ..Self::default()
        }
    }

    pub fn with_deactivate_threshold(mut self, frames: u32) -> Self {
        self.deactivate_threshold = frames;
        self
    }

    /// Extra cells prepared around the camera's visible range. Clamped to zero.
    pub fn with_cull_margin(mut self, cells: i32) -> Self {
        self.cull_margin = cells.max(0);
        self
    }

    pub fn cull_margin(&self) -> i32 {
        self.cull_margin
    }

    pub fn with_objects_per_bucket(mut self, objects: usize) -> Self {
        self.objects_per_bucket = Some(objects);
        self
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            grid_size: Vec2::splat(Self::DEFAULT_GRID_SIZE),
            deactivate_threshold: Self::DEFAULT_DEACTIVATE_THRESHOLD,
            cull_margin: 1,
            objects_per_bucket: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_margin_never_negative() {
        assert_eq!(SceneConfig::default().cull_margin(), 1);
        assert_eq!(SceneConfig::default().with_cull_margin(i32::MIN).cull_margin(), 0);
        assert_eq!(SceneConfig::default().with_cull_margin(3).cull_margin(), 3);
    }
}
