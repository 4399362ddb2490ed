//! Sprite objects and their creation parameters.

use lattice_core::alloc::{ObjectHandle, ObjectPool};
use lattice_core::math::{Affine2, Vec2};
use lattice_render::{Color, SpriteInstance, Texture, TextureArrayId};

use crate::coord::Coord;

/// Which of a cell's three render pools a sprite lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RenderClass {
    /// Opaque, frequently changing sprites.
    #[default]
    Standard,
    /// Opaque sprites that rarely change.
    Static,
    /// Alpha-blended sprites, drawn back to front by layer.
    Translucent,
}

impl RenderClass {
    /// Every class, in draw order.
    pub const ALL: [RenderClass; 3] = [
        RenderClass::Standard,
        RenderClass::Static,
        RenderClass::Translucent,
    ];

    /// Translucency wins over the static hint.
    pub fn from_flags(is_translucent: bool, is_static: bool) -> Self {
        match (is_translucent, is_static) {
            (true, _) => RenderClass::Translucent,
            (false, true) => RenderClass::Static,
            (false, false) => RenderClass::Standard,
        }
    }
}

impl std::fmt::Display for RenderClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderClass::Standard => write!(f, "standard"),
            RenderClass::Static => write!(f, "static"),
            RenderClass::Translucent => write!(f, "translucent"),
        }
    }
}

/// Parameters for [`SceneGraph::create_object`](crate::SceneGraph::create_object).
///
/// ```
/// use lattice_core::math::Vec2;
/// use lattice_render::{Color, Texture, TextureArrayId};
/// use lattice_scene::{RenderClass, SpriteParams};
///
/// let params = SpriteParams::at(Vec2::new(40.0, 12.0))
///     .with_class(RenderClass::Translucent)
///     .with_tint(Color::rgba(1.0, 1.0, 1.0, 0.5))
///     .with_texture(Texture::new(TextureArrayId(1), 3))
///     .with_layer(2.0);
/// assert_eq!(params.transform.translation, Vec2::new(40.0, 12.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteParams {
    pub class: RenderClass,
    /// Maps the unit quad into world space. The translation decides the cell.
    pub transform: Affine2,
    pub tint: Color,
    pub uv_top_left: Vec2,
    pub uv_bottom_right: Vec2,
    pub layer: f32,
    pub texture: Option<Texture>,
}

impl SpriteParams {
    pub fn new(transform: Affine2) -> Self {
        Self {
            transform,
            ..Self::default()
        }
    }

    /// An unscaled sprite translated to `position`.
    pub fn at(position: Vec2) -> Self {
        Self::new(Affine2::from_translation(position))
    }

    pub fn with_class(mut self, class: RenderClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_tint(mut self, tint: Color) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_uv(mut self, top_left: Vec2, bottom_right: Vec2) -> Self {
        self.uv_top_left = top_left;
        self.uv_bottom_right = bottom_right;
        self
    }

    pub fn with_layer(mut self, layer: f32) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_texture(mut self, texture: Texture) -> Self {
        self.texture = Some(texture);
        self
    }
}

impl Default for SpriteParams {
    fn default() -> Self {
        Self {
            class: RenderClass::Standard,
            transform: Affine2::IDENTITY,
            tint: Color::WHITE,
            uv_top_left: Vec2::ZERO,
            uv_bottom_right: Vec2::ONE,
            layer: 0.0,
            texture: None,
        }
    }
}

/// A sprite as stored by the scene graph.
///
/// Read access is through [`SceneGraph::sprite`](crate::SceneGraph::sprite);
/// every change goes through the scene graph so the owning pool sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteObject {
    pub(crate) transform: Affine2,
    pub(crate) tint: Color,
    pub(crate) uv0: Vec2,
    pub(crate) uv1: Vec2,
    pub(crate) layer: f32,
    pub(crate) texture: Option<Texture>,
    pub(crate) class: RenderClass,
    pub(crate) cell: Coord,
}

impl SpriteObject {
    pub(crate) fn from_params(params: &SpriteParams, cell: Coord) -> Self {
        Self {
            transform: params.transform,
            tint: params.tint,
            uv0: params.uv_top_left,
            uv1: params.uv_bottom_right,
            layer: params.layer,
            texture: params.texture,
            class: params.class,
            cell,
        }
    }

    pub fn transform(&self) -> Affine2 {
        self.transform
    }

    pub fn position(&self) -> Vec2 {
        self.transform.translation
    }

    pub fn tint(&self) -> Color {
        self.tint
    }

    /// Top-left and bottom-right texture coordinates.
    pub fn uv(&self) -> (Vec2, Vec2) {
        (self.uv0, self.uv1)
    }

    pub fn layer(&self) -> f32 {
        self.layer
    }

    pub fn texture(&self) -> Option<Texture> {
        self.texture
    }

    pub fn class(&self) -> RenderClass {
        self.class
    }

    /// The grid cell currently holding this sprite.
    pub fn cell(&self) -> Coord {
        self.cell
    }

    /// Texture array the sprite is batched under; `None` when untextured.
    pub fn group_key(&self) -> Option<TextureArrayId> {
        self.texture.map(|texture| texture.array)
    }

    pub fn to_instance(&self) -> SpriteInstance {
        SpriteInstance::new(
            self.transform,
            self.tint,
            self.uv0,
            self.uv1,
            self.layer,
            self.texture.map_or(0, |texture| texture.index),
        )
    }
}

/// Stable handle to a sprite in a [`SceneGraph`](crate::SceneGraph).
///
/// Valid from `create_object` until `destroy_object`. Using it afterwards
/// panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteHandle(pub(crate) ObjectHandle);

impl SpriteHandle {
    /// The underlying allocator handle.
    pub fn raw(self) -> ObjectHandle {
        self.0
    }
}

pub(crate) type SpriteStore = ObjectPool<SpriteObject>;
