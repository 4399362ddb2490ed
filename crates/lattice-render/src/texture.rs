//! Texture identities.
//!
//! The scene graph only ever compares texture arrays for equality; the pixel
//! data and GPU views belong to the backend.

/// Opaque identity of a texture array.
///
/// Sprites sharing a texture array can be drawn from one instance buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureArrayId(pub u64);

/// A single layer of a texture array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture {
    pub array: TextureArrayId,
    /// Layer within the array, written to [`SpriteInstance::texture_index`](crate::SpriteInstance).
    pub index: u32,
}

impl Texture {
    pub const fn new(array: TextureArrayId, index: u32) -> Self {
        Self { array, index }
    }
}
