//! Lattice Scene - a spatial sprite scene graph with cached render batches.
//!
//! Sprites live in a sparse grid of square cells. Each cell keeps three
//! render pools (standard, static and translucent) whose contents are
//! uploaded to instance buffers only when they change. Every frame:
//!
//! 1. Mutate sprites through [`SceneGraph`]; affected pools are marked dirty.
//! 2. Call [`SceneGraph::prepare_rendering`] with the camera; visible dirty
//!    pools upload.
//! 3. Draw the batches from [`SceneGraph::for_each_batch`].
//! 4. Call [`SceneGraph::collect_garbage`]; cells out of view for too long
//!    release their buffers.
//!
//! The GPU side is abstracted by [`lattice_render::InstanceBuffer`].

pub mod batch;
pub mod config;
pub mod coord;
pub mod error;
pub mod graph;
pub mod grid;
pub mod pool;
pub mod sprite;
pub mod visibility;

pub use batch::{PreparePool, UploadStats};
pub use config::SceneConfig;
pub use coord::{CellRange, Coord};
pub use error::{PrepareError, SceneError, UploadResultExt};
pub use graph::{DrawBatch, SceneGraph, SceneStats};
pub use grid::{GridCell, SpatialIndex};
pub use sprite::{RenderClass, SpriteHandle, SpriteObject, SpriteParams};
pub use visibility::{GcStats, Visibility};
