/// SIMD-accelerated `glam` types used for CPU-side math.
///
/// Sprite transforms are [`Affine2`] values: a 2x2 linear part plus a
/// translation, matching the `m11..m32` layout GPU backends expect.
///
/// ```
/// use lattice_core::math::{Affine2, Vec2};
///
/// let transform = Affine2::from_translation(Vec2::new(10.0, 20.0));
/// assert_eq!(transform.translation, Vec2::new(10.0, 20.0));
/// ```
pub mod fast {
    pub use glam::*;
}

/// Packed vector types for GPU buffer uploads.
///
/// These are `#[repr(C)]` and [`Pod`](bytemuck::Pod), so they can be cast to
/// byte slices with [`bytemuck`].
///
/// ```
/// use lattice_core::math::{PackedVec2, Vec2};
///
/// let uv = PackedVec2::from(Vec2::new(0.25, 0.75));
/// let bytes: &[u8] = bytemuck::bytes_of(&uv);
/// assert_eq!(bytes.len(), 8);
/// ```
pub mod packed {
    use bytemuck::{Pod, Zeroable};

    /// A 2D vector with guaranteed `#[repr(C)]` layout.
    ///
    /// ```text
    /// Offset | Field | Size
    /// -------|-------|------
    /// 0      | x     | 4 bytes (f32)
    /// 4      | y     | 4 bytes (f32)
    /// Total: 8 bytes
    /// ```
    #[repr(C)]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
    pub struct Vec2 {
        pub x: f32,
        pub y: f32,
    }

    impl From<glam::Vec2> for Vec2 {
        fn from(v: glam::Vec2) -> Self {
            Self { x: v.x, y: v.y }
        }
    }

    /// A 2D affine transform with guaranteed `#[repr(C)]` layout.
    ///
    /// Rows are `(m11, m12)`, `(m21, m22)` and the translation `(m31, m32)`.
    #[repr(C)]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
    pub struct Affine2 {
        pub m11: f32,
        pub m12: f32,
        pub m21: f32,
        pub m22: f32,
        pub m31: f32,
        pub m32: f32,
    }

    impl From<glam::Affine2> for Affine2 {
        fn from(a: glam::Affine2) -> Self {
            Self {
                m11: a.matrix2.x_axis.x,
                m12: a.matrix2.x_axis.y,
                m21: a.matrix2.y_axis.x,
                m22: a.matrix2.y_axis.y,
                m31: a.translation.x,
                m32: a.translation.y,
            }
        }
    }
}

pub use fast::*;
pub use packed::{Affine2 as PackedAffine2, Vec2 as PackedVec2};

/// An axis-aligned rectangle given by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// The smallest rectangle containing every point.
    ///
    /// Returns `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self { min: first, max: first }, |rect, p| Self {
            min: rect.min.min(p),
            max: rect.max.max(p),
        }))
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}
