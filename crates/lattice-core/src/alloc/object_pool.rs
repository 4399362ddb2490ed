//! Bucketed object pool with stable storage addresses.
//!
//! Objects live in fixed-capacity buckets whose backing storage is reserved up
//! front and never grows, so a live object never moves. Each bucket threads a
//! free list through its vacant slots; freed slots are reused before the
//! bucket's high-water mark grows.

use crate::profiling::profile_function;
use std::num::NonZeroU64;

/// Bytes worth of objects held by a single bucket by default.
pub const DEFAULT_BUCKET_BYTES: usize = 4 * 1024 * 1024;

const FREE_END: u32 = u32::MAX;

/// Generation-checked handle to an object in an [`ObjectPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHandle(NonZeroU64);

impl ObjectHandle {
    pub fn new(generation: u32, idx: u32) -> Self {
        // idx + 1 cannot overflow: the pool never hands out u32::MAX as an index.
        let packed = ((generation as u64) << 32) | (idx as u64 + 1);
        Self(NonZeroU64::new(packed).unwrap_or(NonZeroU64::MAX))
    }

    pub fn generation(&self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        (self.0.get() & u32::MAX as u64) as u32 - 1
    }
}

static_assertions::assert_eq_size!(ObjectHandle, Option<ObjectHandle>);

/// Failure to obtain storage for a new object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The allocator could not reserve memory for a new bucket.
    OutOfMemory { bytes: usize },
    /// Every index representable by [`ObjectHandle`] is in use.
    CapacityOverflow,
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfMemory { bytes } => {
                write!(f, "Failed to reserve {} bytes for an object bucket", bytes)
            }
            Self::CapacityOverflow => write!(f, "Object pool index space exhausted"),
        }
    }
}

impl std::error::Error for AllocError {}

enum Slot<T> {
    Occupied(T),
    Vacant { next_free: u32 },
}

struct Entry<T> {
    generation: u32,
    slot: Slot<T>,
}

struct Bucket<T> {
    /// Reserved to the bucket capacity once; `len()` is the high-water mark.
    entries: Vec<Entry<T>>,
    free_head: u32,
    remaining: u32,
    /// Generation given to slots touched for the first time.
    generation_floor: u32,
}

impl<T> Bucket<T> {
    fn insert(&mut self, value: T) -> (u32, u32) {
        self.remaining -= 1;

        if self.free_head != FREE_END {
            let idx = self.free_head;
            let entry = &mut self.entries[idx as usize];
            match std::mem::replace(&mut entry.slot, Slot::Occupied(value)) {
                Slot::Vacant { next_free } => self.free_head = next_free,
                Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
            }
            (idx, entry.generation)
        } else {
            debug_assert!(self.entries.len() < self.entries.capacity());
            let idx = self.entries.len() as u32;
            self.entries.push(Entry {
                generation: self.generation_floor,
                slot: Slot::Occupied(value),
            });
            (idx, self.generation_floor)
        }
    }

    fn entry(&self, slot: u32, generation: u32) -> Option<&Entry<T>> {
        self.entries
            .get(slot as usize)
            .filter(|entry| entry.generation == generation)
    }

    fn entry_mut(&mut self, slot: u32, generation: u32) -> Option<&mut Entry<T>> {
        self.entries
            .get_mut(slot as usize)
            .filter(|entry| entry.generation == generation)
    }

    /// Generation floor for a bucket that later reuses this bucket's index.
    fn retired_floor(&self) -> u32 {
        self.entries
            .iter()
            .map(|entry| entry.generation)
            .max()
            .unwrap_or(self.generation_floor)
    }
}

/// A bucketed allocator whose handles stay valid until freed.
///
/// # Example
///
/// ```
/// use lattice_core::alloc::ObjectPool;
///
/// let mut pool = ObjectPool::with_bucket_capacity(2);
/// let a = pool.allocate("a").unwrap();
/// let b = pool.allocate("b").unwrap();
/// let c = pool.allocate("c").unwrap(); // lands in a second bucket
///
/// assert_eq!(pool.free(b), "b");
/// assert_eq!(*pool.get(a), "a");
/// assert_eq!(*pool.get(c), "c");
/// assert_eq!(pool.bucket_count(), 2);
/// ```
pub struct ObjectPool<T> {
    buckets: Vec<Option<Bucket<T>>>,
    /// Buckets with at least one free slot; allocation takes from the back.
    free_buckets: Vec<u32>,
    /// Bucket indices released by [`ObjectPool::collect`], ready for reuse.
    retired: Vec<u32>,
    retired_floors: Vec<u32>,
    bucket_capacity: u32,
    len: usize,
}

impl<T> ObjectPool<T> {
    /// Create a pool whose buckets each hold about [`DEFAULT_BUCKET_BYTES`] of objects.
    pub fn new() -> Self {
        let per_bucket = DEFAULT_BUCKET_BYTES / std::mem::size_of::<Entry<T>>().max(1);
        Self::with_bucket_capacity(per_bucket.clamp(1, u32::MAX as usize - 1))
    }

    /// Create a pool with an explicit number of objects per bucket.
    pub fn with_bucket_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "bucket capacity must be non-zero");
        assert!(capacity < u32::MAX as usize, "bucket capacity too large");
        Self {
            buckets: Vec::new(),
            free_buckets: Vec::new(),
            retired: Vec::new(),
            retired_floors: Vec::new(),
            bucket_capacity: capacity as u32,
            len: 0,
        }
    }

    /// Store `value` and return its handle.
    pub fn allocate(&mut self, value: T) -> Result<ObjectHandle, AllocError> {
        profile_function!();
        let bucket_idx = match self.free_buckets.last() {
            Some(&idx) => idx,
            None => {
                let idx = self.new_bucket()?;
                self.free_buckets.push(idx);
                idx
            }
        };

        let Some(bucket) = self.buckets[bucket_idx as usize].as_mut() else {
            unreachable!("free bucket list refers to a retired bucket");
        };
        let (slot, generation) = bucket.insert(value);
        if bucket.remaining == 0 {
            self.free_buckets.pop();
        }

        self.len += 1;
        Ok(ObjectHandle::new(
            generation,
            bucket_idx * self.bucket_capacity + slot,
        ))
    }

    /// Release the object behind `handle`, returning it.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was already freed.
    pub fn free(&mut self, handle: ObjectHandle) -> T {
        profile_function!();
        let (bucket_idx, slot) = self.locate(handle);
        let bucket = self
            .buckets
            .get_mut(bucket_idx as usize)
            .and_then(Option::as_mut);
        let Some(bucket) = bucket else {
            panic!("invalid generation, use after free!");
        };
        let free_head = bucket.free_head;
        let Some(entry) = bucket.entry_mut(slot, handle.generation()) else {
            panic!("invalid generation, use after free!");
        };

        let Slot::Occupied(value) =
            std::mem::replace(&mut entry.slot, Slot::Vacant { next_free: free_head })
        else {
            unreachable!("live generation on a vacant slot");
        };
        entry.generation = entry.generation.wrapping_add(1);
        bucket.free_head = slot;

        if bucket.remaining == 0 {
            self.free_buckets.push(bucket_idx);
        }
        bucket.remaining += 1;
        self.len -= 1;
        value
    }

    /// # Panics
    ///
    /// Panics if `handle` was freed.
    pub fn get(&self, handle: ObjectHandle) -> &T {
        match self.try_get(handle) {
            Some(value) => value,
            None => panic!("invalid generation, use after free!"),
        }
    }

    /// # Panics
    ///
    /// Panics if `handle` was freed.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> &mut T {
        match self.try_get_mut(handle) {
            Some(value) => value,
            None => panic!("invalid generation, use after free!"),
        }
    }

    pub fn try_get(&self, handle: ObjectHandle) -> Option<&T> {
        let (bucket_idx, slot) = self.locate(handle);
        let entry = self
            .buckets
            .get(bucket_idx as usize)?
            .as_ref()?
            .entry(slot, handle.generation())?;
        match &entry.slot {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn try_get_mut(&mut self, handle: ObjectHandle) -> Option<&mut T> {
        let (bucket_idx, slot) = self.locate(handle);
        let entry = self
            .buckets
            .get_mut(bucket_idx as usize)?
            .as_mut()?
            .entry_mut(slot, handle.generation())?;
        match &mut entry.slot {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.try_get(handle).is_some()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets currently holding storage.
    pub fn bucket_count(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_some()).count()
    }

    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity as usize
    }

    /// Release every bucket that holds no live objects.
    ///
    /// Returns the number of buckets released.
    pub fn collect(&mut self) -> usize {
        self.collect_with_reserve(0)
    }

    /// Release empty buckets, keeping up to `keep` of them for future
    /// allocations. The kept buckets are the ones allocation uses next.
    ///
    /// Returns the number of buckets released.
    pub fn collect_with_reserve(&mut self, keep: usize) -> usize {
        profile_function!();
        let live = self.len;
        let Self {
            buckets,
            free_buckets,
            retired,
            retired_floors,
            bucket_capacity,
            ..
        } = self;

        let is_empty =
            |bucket: &Option<Bucket<T>>| matches!(bucket, Some(b) if b.remaining == *bucket_capacity);
        let empty = free_buckets
            .iter()
            .filter(|&&idx| is_empty(&buckets[idx as usize]))
            .count();
        let mut to_release = empty.saturating_sub(keep);

        let before = retired.len();
        free_buckets.retain(|&idx| {
            let idx = idx as usize;
            if to_release == 0 || !is_empty(&buckets[idx]) {
                return true;
            }
            if let Some(bucket) = buckets[idx].take() {
                retired_floors[idx] = bucket.retired_floor();
            }
            retired.push(idx as u32);
            to_release -= 1;
            false
        });

        let released = retired.len() - before;
        if released > 0 {
            tracing::debug!(released, live, "object pool released empty buckets");
        }
        released
    }

    /// Iterate live objects with their handles, in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &T)> + '_ {
        let capacity = self.bucket_capacity;
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(idx, bucket)| bucket.as_ref().map(|b| (idx as u32, b)))
            .flat_map(move |(bucket_idx, bucket)| {
                bucket
                    .entries
                    .iter()
                    .enumerate()
                    .filter_map(move |(slot, entry)| match &entry.slot {
                        Slot::Occupied(value) => Some((
                            ObjectHandle::new(
                                entry.generation,
                                bucket_idx * capacity + slot as u32,
                            ),
                            value,
                        )),
                        Slot::Vacant { .. } => None,
                    })
            })
    }

    fn locate(&self, handle: ObjectHandle) -> (u32, u32) {
        let index = handle.index();
        (index / self.bucket_capacity, index % self.bucket_capacity)
    }

    fn new_bucket(&mut self) -> Result<u32, AllocError> {
        let (idx, generation_floor) = match self.retired.pop() {
            Some(idx) => (idx, self.retired_floors[idx as usize]),
            None => {
                let idx = self.buckets.len();
                let end = (idx + 1)
                    .checked_mul(self.bucket_capacity as usize)
                    .ok_or(AllocError::CapacityOverflow)?;
                if end >= u32::MAX as usize {
                    return Err(AllocError::CapacityOverflow);
                }
                (idx as u32, 0)
            }
        };

        let mut entries = Vec::new();
        if entries.try_reserve_exact(self.bucket_capacity as usize).is_err() {
            if (idx as usize) < self.buckets.len() {
                self.retired.push(idx);
            }
            return Err(AllocError::OutOfMemory {
                bytes: self.bucket_capacity as usize * std::mem::size_of::<Entry<T>>(),
            });
        }

        let bucket = Bucket {
            entries,
            free_head: FREE_END,
            remaining: self.bucket_capacity,
            generation_floor,
        };
        if (idx as usize) < self.buckets.len() {
            self.buckets[idx as usize] = Some(bucket);
        } else {
            self.buckets.push(Some(bucket));
            self.retired_floors.push(0);
        }

        tracing::trace!(bucket = idx, capacity = self.bucket_capacity, "object pool bucket allocated");
        Ok(idx)
    }
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
