//! Lattice Render - the GPU boundary of the sprite scene graph.
//!
//! The scene graph never talks to a graphics API directly. Everything it
//! needs from a backend is expressed here:
//!
//! - [`InstanceBuffer`]: the upload capability every batch is built on
//! - [`SpriteInstance`]: the compact per-sprite record uploaded to the GPU
//! - [`Texture`] / [`TextureArrayId`]: texture identities used for grouping
//! - [`Camera2D`]: produces the world-to-NDC view transform
//!
//! Two buffer implementations ship with the crate: [`StagingInstanceBuffer`]
//! keeps instances on the CPU, and `WgpuInstanceBuffer` (feature `wgpu`)
//! writes them into a vertex buffer.

mod buffer;
mod camera;
mod color;
mod instance;
mod texture;
#[cfg(feature = "wgpu")]
mod wgpu_buffer;

pub use buffer::*;
pub use camera::*;
pub use color::*;
pub use instance::*;
pub use texture::*;
#[cfg(feature = "wgpu")]
pub use wgpu_buffer::*;
