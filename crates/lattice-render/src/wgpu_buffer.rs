//! `wgpu`-backed instance buffer.
//!
//! Instances are staged on the CPU during an upload and written with a
//! single `Queue::write_buffer` call on `finish`.

use crate::{BufferError, InstanceBuffer, ResizePolicy, SpriteInstance};

/// Device and queue pair passed through the scene graph to every upload.
pub struct WgpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

/// GPU instance buffer usable as a vertex buffer with per-instance stepping.
#[derive(Default)]
pub struct WgpuInstanceBuffer {
    buffer: Option<wgpu::Buffer>,
    staging: Vec<SpriteInstance>,
    policy: ResizePolicy,
    expected: u32,
}

impl WgpuInstanceBuffer {
    /// The GPU buffer, if an upload has happened.
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Vertex buffer layout matching [`SpriteInstance`].
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![
            // location 2: transform matrix2 (vec4)
            2 => Float32x4,
            // location 3: transform translation (vec2)
            3 => Float32x2,
            // location 4: tint (vec4)
            4 => Float32x4,
            // location 5: uv0 (vec2)
            5 => Float32x2,
            // location 6: uv1 (vec2)
            6 => Float32x2,
            // location 7: layer (f32)
            7 => Float32,
            // location 8: texture_index (u32)
            8 => Uint32,
        ];

        wgpu::VertexBufferLayout {
            array_stride: SpriteInstance::SIZE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: ATTRS,
        }
    }
}

impl InstanceBuffer for WgpuInstanceBuffer {
    type Device = WgpuDevice;

    fn start_upload(&mut self, device: &WgpuDevice, count: u32) -> Result<(), BufferError> {
        if count == 0 {
            return Err(BufferError::ZeroSized);
        }

        if self.buffer.is_none() || self.policy.needs_resize(count) {
            let capacity = ResizePolicy::grown_capacity(count);
            let size = capacity as u64 * SpriteInstance::SIZE;
            if size > device.device.limits().max_buffer_size {
                return Err(BufferError::OutOfMemory { bytes: size });
            }

            // Drop the old buffer first so its memory can be reused.
            self.buffer = None;
            self.buffer = Some(device.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Sprite Instance Buffer"),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.policy.resized(capacity);
            tracing::trace!(capacity, "sprite instance buffer allocated");
        }

        self.expected = count;
        self.staging.clear();
        self.staging.reserve(count as usize);
        Ok(())
    }

    fn push(&mut self, instance: &SpriteInstance) {
        self.staging.push(*instance);
    }

    fn finish(&mut self, device: &WgpuDevice) -> Result<(), BufferError> {
        let Some(buffer) = self.buffer.as_ref() else {
            return Err(BufferError::Device("finish called without start_upload".into()));
        };
        if self.staging.len() as u32 != self.expected {
            return Err(BufferError::Device(format!(
                "upload finished with {} of {} instances",
                self.staging.len(),
                self.expected
            )));
        }

        device
            .queue
            .write_buffer(buffer, 0, bytemuck::cast_slice(&self.staging));
        self.policy.record(self.expected);
        Ok(())
    }

    fn count(&self) -> u32 {
        self.policy.last_count()
    }
}
