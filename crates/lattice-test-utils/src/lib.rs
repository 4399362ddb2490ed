//! Test utilities for the Lattice scene graph.
//!
//! The main component is a mock GPU boundary:
//!
//! - `MockDevice` - records every upload and release, and can be told to fail
//! - `MockInstanceBuffer` - an [`InstanceBuffer`](lattice_render::InstanceBuffer)
//!   that reports to the device it last uploaded through
//!
//! Both require the `mock` feature.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use lattice_render::{Color, InstanceBuffer, SpriteInstance};
//! use lattice_test_utils::{MockDevice, MockInstanceBuffer};
//!
//! let device = MockDevice::new();
//! let mut buffer = MockInstanceBuffer::default();
//! let instance = SpriteInstance::new(
//!     Default::default(),
//!     Color::WHITE,
//!     Default::default(),
//!     Default::default(),
//!     0.0,
//!     0,
//! );
//!
//! buffer.start_upload(&device, 1).unwrap();
//! buffer.push(&instance);
//! buffer.finish(&device).unwrap();
//!
//! assert_eq!(device.count_uploads(), 1);
//! assert_eq!(device.uploaded_instances(), 1);
//! # }
//! ```

#[cfg(feature = "mock")]
pub mod mock_buffer;

#[cfg(feature = "mock")]
pub use mock_buffer::*;
