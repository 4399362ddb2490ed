//! The per-sprite record uploaded to instance buffers.

use bytemuck::{Pod, Zeroable};
use lattice_core::math::{Affine2, PackedAffine2, PackedVec2, Vec2};

use crate::Color;

/// Per-sprite GPU instance data.
///
/// 64 bytes total, 16-byte multiple. The transform maps the unit quad to
/// world space; `uv0`/`uv1` are the top-left and bottom-right texture
/// coordinates.
///
/// ```text
/// Offset | Field         | Size
/// -------|---------------|------
/// 0      | transform     | 24 bytes
/// 24     | tint          | 16 bytes
/// 40     | uv0           | 8 bytes
/// 48     | uv1           | 8 bytes
/// 56     | layer         | 4 bytes
/// 60     | texture_index | 4 bytes
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    pub transform: PackedAffine2,
    pub tint: Color,
    pub uv0: PackedVec2,
    pub uv1: PackedVec2,
    pub layer: f32,
    pub texture_index: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<SpriteInstance>(), 64);

impl SpriteInstance {
    /// Size of the instance in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(
        transform: Affine2,
        tint: Color,
        uv0: Vec2,
        uv1: Vec2,
        layer: f32,
        texture_index: u32,
    ) -> Self {
        Self {
            transform: transform.into(),
            tint,
            uv0: uv0.into(),
            uv1: uv1.into(),
            layer,
            texture_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_bytes_follow_field_order() {
        let instance = SpriteInstance::new(
            Affine2::from_translation(Vec2::new(5.0, 6.0)),
            Color::RED,
            Vec2::ZERO,
            Vec2::ONE,
            2.5,
            7,
        );
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&instance));
        assert_eq!(&floats[..6], &[1.0, 0.0, 0.0, 1.0, 5.0, 6.0]);
        assert_eq!(&floats[6..10], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(floats[14], 2.5);
        assert_eq!(floats[15].to_bits(), 7);
    }
}
