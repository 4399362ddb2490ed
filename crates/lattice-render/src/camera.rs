//! 2D camera producing the view transform used for culling.
//!
//! The camera's placement transform maps camera space into the world. Its
//! inverse, scaled by the aspect ratio, maps the world into normalized
//! device coordinates where the viewport spans `[-1, 1]` on both axes.
//!
//! ```
//! use lattice_core::math::{Affine2, Vec2};
//! use lattice_render::{Camera2D, ViewSource};
//!
//! let mut camera = Camera2D::new(2.0);
//! camera
//!     .set_transform(Affine2::from_scale_angle_translation(
//!         Vec2::splat(100.0),
//!         0.0,
//!         Vec2::new(500.0, 0.0),
//!     ))
//!     .unwrap();
//!
//! // The right edge of the viewport sits two camera units right of its centre.
//! let ndc = camera.view_transform().transform_point2(Vec2::new(700.0, 100.0));
//! assert!((ndc - Vec2::new(1.0, 1.0)).length() < 1e-5);
//! ```

use lattice_core::math::{Affine2, Vec2};

/// Camera error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraError {
    /// The placement transform has no inverse
    NotInvertible,
    /// Aspect ratio must be positive and finite
    InvalidAspectRatio(f32),
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInvertible => write!(f, "Camera transform is not invertible"),
            Self::InvalidAspectRatio(aspect) => write!(f, "Invalid camera aspect ratio {}", aspect),
        }
    }
}

impl std::error::Error for CameraError {}

/// Anything that can report the current world-to-NDC transform.
pub trait ViewSource {
    fn view_transform(&self) -> Affine2;
}

impl ViewSource for Affine2 {
    fn view_transform(&self) -> Affine2 {
        *self
    }
}

/// Whether `transform` has an inverse.
///
/// Views of large worlds have tiny determinants, so only an exact zero counts.
pub fn is_invertible(transform: &Affine2) -> bool {
    let det = transform.matrix2.determinant();
    det.is_finite() && det != 0.0
}

/// A 2D camera with a placement transform and an aspect ratio.
#[derive(Debug, Clone)]
pub struct Camera2D {
    transform: Affine2,
    aspect_ratio: f32,
    /// Cached world-to-NDC transform
    view: Affine2,
}

impl Camera2D {
    /// Create a camera at the origin covering `[-aspect, aspect] x [-1, 1]`.
    pub fn new(aspect_ratio: f32) -> Self {
        let aspect_ratio = if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
            aspect_ratio
        } else {
            tracing::warn!("Invalid camera aspect ratio {aspect_ratio}, using 1.0");
            1.0
        };
        let mut camera = Self {
            transform: Affine2::IDENTITY,
            aspect_ratio,
            view: Affine2::IDENTITY,
        };
        camera.update();
        camera
    }

    pub fn transform(&self) -> Affine2 {
        self.transform
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    /// Place the camera in the world.
    ///
    /// The previous transform is kept if `transform` cannot be inverted.
    pub fn set_transform(&mut self, transform: Affine2) -> Result<(), CameraError> {
        if !is_invertible(&transform) {
            return Err(CameraError::NotInvertible);
        }
        self.transform = transform;
        self.update();
        Ok(())
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) -> Result<(), CameraError> {
        if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
            return Err(CameraError::InvalidAspectRatio(aspect_ratio));
        }
        self.aspect_ratio = aspect_ratio;
        self.update();
        Ok(())
    }

    /// Convert a world position to normalized device coordinates.
    pub fn world_to_ndc(&self, world: Vec2) -> Vec2 {
        self.view.transform_point2(world)
    }

    fn update(&mut self) {
        self.view = Affine2::from_scale(Vec2::new(1.0 / self.aspect_ratio, 1.0))
            * self.transform.inverse();
    }
}

impl Default for Camera2D {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ViewSource for Camera2D {
    fn view_transform(&self) -> Affine2 {
        self.view
    }
}
