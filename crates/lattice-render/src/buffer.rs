//! The instance-buffer capability the scene graph batches into.

use crate::SpriteInstance;

/// Number of recent upload sizes remembered by [`ResizePolicy`].
pub const UPLOAD_HISTORY: usize = 8;

/// Failure reported by an [`InstanceBuffer`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// An upload of zero instances was requested.
    ZeroSized,
    /// The device could not allocate a buffer of the requested size.
    OutOfMemory { bytes: u64 },
    /// Any other device-level failure.
    Device(String),
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroSized => write!(f, "Cannot create an instance buffer of size 0"),
            Self::OutOfMemory { bytes } => {
                write!(f, "Out of device memory allocating {} bytes", bytes)
            }
            Self::Device(msg) => write!(f, "Device error: {}", msg),
        }
    }
}

impl std::error::Error for BufferError {}

/// A GPU instance buffer that batches are uploaded into.
///
/// An upload is always `start_upload`, exactly `count` calls to `push`,
/// then `finish`. Implementations release their GPU resources on drop.
pub trait InstanceBuffer: Default {
    /// Backend device passed through to every upload.
    type Device: ?Sized;

    /// Begin an upload of `count` instances, (re)allocating storage as needed.
    fn start_upload(&mut self, device: &Self::Device, count: u32) -> Result<(), BufferError>;

    /// Append one instance to the upload in progress.
    fn push(&mut self, instance: &SpriteInstance);

    /// Complete the upload in progress.
    fn finish(&mut self, device: &Self::Device) -> Result<(), BufferError>;

    /// Number of instances in the last upload.
    fn count(&self) -> u32;
}

/// Capacity policy shared by the buffer implementations.
///
/// Buffers are allocated at 1.5x the requested count. They are reallocated
/// when too small, or shrunk once every remembered upload used at most a
/// third of the capacity.
#[derive(Debug, Clone)]
pub struct ResizePolicy {
    capacity: u32,
    previous_counts: [u32; UPLOAD_HISTORY],
}

impl ResizePolicy {
    pub fn new() -> Self {
        Self {
            capacity: 0,
            previous_counts: [u32::MAX; UPLOAD_HISTORY],
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Whether an upload of `count` instances needs new storage.
    pub fn needs_resize(&self, count: u32) -> bool {
        if self.capacity == 0 || self.capacity < count {
            return true;
        }
        self.previous_counts.iter().all(|&c| c <= self.capacity / 3)
    }

    /// Capacity to allocate for an upload of `count` instances.
    pub fn grown_capacity(count: u32) -> u32 {
        count.saturating_add(count / 2).max(1)
    }

    /// Record a reallocation to `capacity`, forgetting the upload history.
    pub fn resized(&mut self, capacity: u32) {
        self.capacity = capacity;
        self.previous_counts = [u32::MAX; UPLOAD_HISTORY];
    }

    /// Remember an upload of `count` instances.
    pub fn record(&mut self, count: u32) {
        self.previous_counts.rotate_right(1);
        self.previous_counts[0] = count;
    }

    pub fn last_count(&self) -> u32 {
        match self.previous_counts[0] {
            u32::MAX => 0,
            count => count,
        }
    }

    /// Forget the storage entirely.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// An [`InstanceBuffer`] that keeps its instances in CPU memory.
///
/// Useful for headless runs and for backends that copy instance data
/// themselves at draw time.
#[derive(Debug, Default)]
pub struct StagingInstanceBuffer {
    instances: Vec<SpriteInstance>,
    policy: ResizePolicy,
    expected: u32,
}

impl StagingInstanceBuffer {
    /// The instances of the last completed upload.
    pub fn instances(&self) -> &[SpriteInstance] {
        &self.instances
    }

    pub fn capacity(&self) -> u32 {
        self.policy.capacity()
    }
}

impl InstanceBuffer for StagingInstanceBuffer {
    type Device = ();

    fn start_upload(&mut self, _device: &(), count: u32) -> Result<(), BufferError> {
        if count == 0 {
            return Err(BufferError::ZeroSized);
        }

        if self.policy.needs_resize(count) {
            let capacity = ResizePolicy::grown_capacity(count);
            let mut instances = Vec::new();
            instances
                .try_reserve_exact(capacity as usize)
                .map_err(|_| BufferError::OutOfMemory {
                    bytes: capacity as u64 * SpriteInstance::SIZE,
                })?;
            self.instances = instances;
            self.policy.resized(capacity);
        }

        self.instances.clear();
        self.expected = count;
        Ok(())
    }

    fn push(&mut self, instance: &SpriteInstance) {
        debug_assert!((self.instances.len() as u32) < self.expected);
        self.instances.push(*instance);
    }

    fn finish(&mut self, _device: &()) -> Result<(), BufferError> {
        if self.instances.len() as u32 != self.expected {
            return Err(BufferError::Device(format!(
                "upload finished with {} of {} instances",
                self.instances.len(),
                self.expected
            )));
        }
        self.policy.record(self.expected);
        Ok(())
    }

    fn count(&self) -> u32 {
        self.policy.last_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(buffer: &mut StagingInstanceBuffer, count: u32) {
        buffer.start_upload(&(), count).unwrap();
        for _ in 0..count {
            buffer.push(&bytemuck::Zeroable::zeroed());
        }
        buffer.finish(&()).unwrap();
    }

    #[test]
    fn test_zero_sized_upload_rejected() {
        let mut buffer = StagingInstanceBuffer::default();
        assert_eq!(buffer.start_upload(&(), 0), Err(BufferError::ZeroSized));
    }

    #[test]
    fn test_first_upload_allocates_with_headroom() {
        let mut buffer = StagingInstanceBuffer::default();
        upload(&mut buffer, 10);
        assert_eq!(buffer.capacity(), 15);
        assert_eq!(buffer.count(), 10);
        assert_eq!(buffer.instances().len(), 10);
    }

    #[test]
    fn test_small_uploads_reuse_then_shrink() {
        let mut buffer = StagingInstanceBuffer::default();
        upload(&mut buffer, 30);
        assert_eq!(buffer.capacity(), 45);

        // Fewer than eight small uploads keep the large allocation.
        for _ in 0..7 {
            upload(&mut buffer, 2);
        }
        assert_eq!(buffer.capacity(), 45);

        // History is now all small counts (30 was pushed out), so it shrinks.
        upload(&mut buffer, 2);
        upload(&mut buffer, 2);
        assert_eq!(buffer.capacity(), 3);
    }

    #[test]
    fn test_failed_finish_keeps_previous_count() {
        let mut buffer = StagingInstanceBuffer::default();
        upload(&mut buffer, 2);

        buffer.start_upload(&(), 5).unwrap();
        buffer.push(&bytemuck::Zeroable::zeroed());
        assert!(buffer.finish(&()).is_err());
        assert_eq!(buffer.count(), 2);
    }

    #[test]
    fn test_growth_when_too_small() {
        let mut buffer = StagingInstanceBuffer::default();
        upload(&mut buffer, 4);
        upload(&mut buffer, 100);
        assert_eq!(buffer.capacity(), 150);
        assert_eq!(buffer.count(), 100);
    }

    #[test]
    fn test_short_upload_fails_finish() {
        let mut buffer = StagingInstanceBuffer::default();
        buffer.start_upload(&(), 3).unwrap();
        buffer.push(&bytemuck::Zeroable::zeroed());
        assert!(matches!(buffer.finish(&()), Err(BufferError::Device(_))));
    }
}
