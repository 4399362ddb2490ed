//! Uploads render pools into instance buffers.
//!
//! Opaque pools upload each dirty texture-array group into its own buffer.
//! Translucent pools are split into runs of consecutive sprites sharing a
//! texture array; each run gets a buffer, reused by position across frames.

use lattice_core::profiling::profile_function;
use lattice_render::{BufferError, InstanceBuffer};

use crate::error::{PrepareError, UploadResultExt};
use crate::pool::{GroupKey, OpaquePool, TranslucentPool};
use crate::sprite::{SpriteHandle, SpriteStore};

/// Upload work done while preparing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Buffers uploaded.
    pub batches: usize,
    /// Instances written across those buffers.
    pub instances: usize,
}

impl std::ops::AddAssign for UploadStats {
    fn add_assign(&mut self, rhs: Self) {
        self.batches += rhs.batches;
        self.instances += rhs.instances;
    }
}

fn describe(key: GroupKey) -> String {
    match key {
        Some(array) => format!("texture array {}", array.0),
        None => "untextured group".to_string(),
    }
}

/// Write one batch: `start_upload`, every instance, then `finish`.
fn upload<'a, B: InstanceBuffer>(
    buffer: &mut B,
    device: &B::Device,
    store: &SpriteStore,
    sprites: impl ExactSizeIterator<Item = &'a SpriteHandle>,
) -> Result<usize, BufferError> {
    let len = sprites.len();
    let count = u32::try_from(len)
        .map_err(|_| BufferError::Device(format!("batch of {} instances is too large", len)))?;

    buffer.start_upload(device, count)?;
    for handle in sprites {
        buffer.push(&store.get(handle.0).to_instance());
    }
    buffer.finish(device)?;
    tracing::trace!("Uploaded batch of {} instances", count);
    Ok(len)
}

/// Upload every dirty group of an opaque pool.
///
/// Groups that fail keep their previous batch and stay dirty.
pub fn prepare_opaque<B: InstanceBuffer>(
    pool: &mut OpaquePool<B>,
    store: &SpriteStore,
    device: &B::Device,
) -> Result<UploadStats, PrepareError> {
    profile_function!();
    let mut stats = UploadStats::default();

    for (key, group) in pool.groups.iter_mut().filter(|(_, group)| group.dirty) {
        let existing = group.batch.take();
        let reused = existing.is_some();
        let mut batch = existing.unwrap_or_default();

        let result = upload(&mut batch, device, store, group.sprites.iter());
        if result.is_ok() || reused {
            group.batch = Some(batch);
        }
        let instances = result.upload_context(|| describe(*key))?;

        group.dirty = false;
        stats.batches += 1;
        stats.instances += instances;
    }

    if !pool.groups.is_empty() {
        pool.active = true;
    }
    Ok(stats)
}

/// Rebuild a dirty translucent pool's runs.
///
/// On failure the pool stays dirty and keeps every batch it still owns.
pub fn prepare_translucent<B: InstanceBuffer>(
    pool: &mut TranslucentPool<B>,
    store: &SpriteStore,
    device: &B::Device,
) -> Result<UploadStats, PrepareError> {
    profile_function!();
    let mut stats = UploadStats::default();
    if !pool.dirty {
        return Ok(stats);
    }

    let mut previous = std::mem::take(&mut pool.batches).into_iter();
    let mut batches = Vec::new();

    let runs = pool
        .sprites
        .chunk_by(|a, b| store.get(a.0).group_key() == store.get(b.0).group_key());
    for run in runs {
        let key = store.get(run[0].0).group_key();
        let existing = previous.next();
        let reused = existing.is_some();
        let mut batch = existing.map(|(_, batch)| batch).unwrap_or_default();

        match upload(&mut batch, device, store, run.iter()) {
            Ok(instances) => {
                batches.push((key, batch));
                stats.batches += 1;
                stats.instances += instances;
            }
            Err(err) => {
                if reused {
                    batches.push((key, batch));
                }
                batches.extend(previous);
                pool.batches = batches;
                return Err(PrepareError::from(err).context(describe(key)));
            }
        }
    }

    // Leftover batches from longer run lists drop here.
    drop(previous);
    pool.batches = batches;
    pool.dirty = false;
    pool.active = !pool.sprites.is_empty();
    Ok(stats)
}

/// A render pool that can upload its dirty contents.
pub trait PreparePool<B: InstanceBuffer> {
    fn prepare_pool(
        &mut self,
        store: &SpriteStore,
        device: &B::Device,
    ) -> Result<UploadStats, PrepareError>;
}

impl<B: InstanceBuffer> PreparePool<B> for OpaquePool<B> {
    fn prepare_pool(
        &mut self,
        store: &SpriteStore,
        device: &B::Device,
    ) -> Result<UploadStats, PrepareError> {
        prepare_opaque(self, store, device)
    }
}

impl<B: InstanceBuffer> PreparePool<B> for TranslucentPool<B> {
    fn prepare_pool(
        &mut self,
        store: &SpriteStore,
        device: &B::Device,
    ) -> Result<UploadStats, PrepareError> {
        prepare_translucent(self, store, device)
    }
}
