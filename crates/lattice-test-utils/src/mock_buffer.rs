//! Mock implementation of InstanceBuffer for testing.
//!
//! Uploads are recorded on the [`MockDevice`] instead of touching a GPU.

use std::sync::Arc;

use lattice_render::{BufferError, InstanceBuffer, SpriteInstance};
use parking_lot::Mutex;

/// Records a buffer operation for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferCall {
    /// A completed upload.
    Upload {
        buffer_id: usize,
        instances: Vec<SpriteInstance>,
    },
    /// An upload rejected because the device was set to fail.
    Failed { buffer_id: usize, count: u32 },
    /// A buffer holding GPU storage was dropped.
    Release { buffer_id: usize },
}

#[derive(Debug, Default)]
struct DeviceState {
    calls: Vec<BufferCall>,
    next_buffer_id: usize,
    /// Number of upcoming uploads that will fail
    fail_uploads: usize,
    /// Uploads allowed to succeed before the failures start
    fail_after: usize,
}

/// Mock device shared by every [`MockInstanceBuffer`] uploaded through it.
///
/// # Borrow Checking Pattern: Interior Mutability
///
/// Uploads only receive `&MockDevice`, but need to record calls. The state
/// lives behind an `Arc<parking_lot::Mutex<_>>` so buffers can also report
/// their release from `Drop`.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` uploads fail with [`BufferError::OutOfMemory`].
    pub fn fail_next_uploads(&self, count: usize) {
        self.fail_uploads_after(0, count);
    }

    /// Let `successes` uploads through, then fail the following `count`.
    pub fn fail_uploads_after(&self, successes: usize, count: usize) {
        let mut state = self.state.lock();
        state.fail_after = successes;
        state.fail_uploads = count;
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<BufferCall> {
        self.state.lock().calls.clone()
    }

    /// Count completed uploads.
    pub fn count_uploads(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BufferCall::Upload { .. }))
            .count()
    }

    /// Count failed uploads.
    pub fn count_failures(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BufferCall::Failed { .. }))
            .count()
    }

    /// Count buffers released.
    pub fn count_releases(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BufferCall::Release { .. }))
            .count()
    }

    /// Total number of instances across all completed uploads.
    pub fn uploaded_instances(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .map(|call| match call {
                BufferCall::Upload { instances, .. } => instances.len(),
                _ => 0,
            })
            .sum()
    }

    /// Instance counts of completed uploads, in order.
    pub fn upload_sizes(&self) -> Vec<usize> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BufferCall::Upload { instances, .. } => Some(instances.len()),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

#[derive(Debug)]
struct Binding {
    id: usize,
    device: Arc<Mutex<DeviceState>>,
}

/// Instance buffer that records its uploads on a [`MockDevice`].
#[derive(Debug, Default)]
pub struct MockInstanceBuffer {
    binding: Option<Binding>,
    pending: Vec<SpriteInstance>,
    expected: u32,
    count: u32,
}

impl MockInstanceBuffer {
    /// Mock buffer id, assigned on first upload.
    pub fn id(&self) -> Option<usize> {
        self.binding.as_ref().map(|binding| binding.id)
    }

    fn bind(&mut self, device: &MockDevice) -> usize {
        if let Some(binding) = &self.binding {
            return binding.id;
        }
        let id = {
            let mut state = device.state.lock();
            state.next_buffer_id += 1;
            state.next_buffer_id
        };
        self.binding = Some(Binding {
            id,
            device: device.state.clone(),
        });
        id
    }
}

impl InstanceBuffer for MockInstanceBuffer {
    type Device = MockDevice;

    fn start_upload(&mut self, device: &MockDevice, count: u32) -> Result<(), BufferError> {
        if count == 0 {
            return Err(BufferError::ZeroSized);
        }
        let buffer_id = self.bind(device);

        let mut state = device.state.lock();
        if state.fail_uploads > 0 && state.fail_after > 0 {
            state.fail_after -= 1;
        } else if state.fail_uploads > 0 {
            state.fail_uploads -= 1;
            state.calls.push(BufferCall::Failed { buffer_id, count });
            return Err(BufferError::OutOfMemory {
                bytes: count as u64 * SpriteInstance::SIZE,
            });
        }

        self.pending.clear();
        self.expected = count;
        Ok(())
    }

    fn push(&mut self, instance: &SpriteInstance) {
        self.pending.push(*instance);
    }

    fn finish(&mut self, device: &MockDevice) -> Result<(), BufferError> {
        if self.pending.len() as u32 != self.expected {
            return Err(BufferError::Device(format!(
                "upload finished with {} of {} instances",
                self.pending.len(),
                self.expected
            )));
        }
        let buffer_id = self.bind(device);
        self.count = self.expected;
        device.state.lock().calls.push(BufferCall::Upload {
            buffer_id,
            instances: std::mem::take(&mut self.pending),
        });
        Ok(())
    }

    fn count(&self) -> u32 {
        self.count
    }
}

impl Drop for MockInstanceBuffer {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.device.lock().calls.push(BufferCall::Release {
                buffer_id: binding.id,
            });
        }
    }
}
