//! Per-cell render pools and their dirty tracking.
//!
//! Each grid cell owns two [`OpaquePool`]s (standard and static) and one
//! [`TranslucentPool`]. Pools only track membership and dirtiness; the
//! uploads themselves happen in [`batch`](crate::batch).

use lattice_core::alloc::{HashMap, HashSet};
use lattice_render::TextureArrayId;

use crate::sprite::{SpriteHandle, SpriteStore};

/// Texture array a group batches under; `None` for untextured sprites.
pub type GroupKey = Option<TextureArrayId>;

/// Sprites of one opaque pool sharing a texture array.
#[derive(Debug)]
pub struct SpriteGroup<B> {
    pub(crate) sprites: HashSet<SpriteHandle>,
    pub(crate) dirty: bool,
    pub(crate) batch: Option<B>,
}

impl<B> SpriteGroup<B> {
    fn new() -> Self {
        Self {
            sprites: HashSet::new(),
            dirty: true,
            batch: None,
        }
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn contains(&self, handle: SpriteHandle) -> bool {
        self.sprites.contains(&handle)
    }

    /// Whether the group changed since its last successful upload.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn batch(&self) -> Option<&B> {
        self.batch.as_ref()
    }
}

/// Opaque sprites of one cell, grouped by texture array.
#[derive(Debug)]
pub struct OpaquePool<B> {
    pub(crate) groups: HashMap<GroupKey, SpriteGroup<B>>,
    pub(crate) active: bool,
}

impl<B> OpaquePool<B> {
    pub fn new() -> Self {
        Self {
            groups: HashMap::new(),
            active: false,
        }
    }

    pub fn insert(&mut self, handle: SpriteHandle, key: GroupKey) {
        let group = self.groups.entry(key).or_insert_with(SpriteGroup::new);
        group.sprites.insert(handle);
        group.dirty = true;
        self.active = true;
    }

    /// Remove a sprite from its group, dropping the group once empty.
    ///
    /// Returns whether the sprite was a member.
    pub fn remove(&mut self, handle: SpriteHandle, key: GroupKey) -> bool {
        let Some(group) = self.groups.get_mut(&key) else {
            return false;
        };
        if !group.sprites.remove(&handle) {
            return false;
        }
        group.dirty = true;
        if group.sprites.is_empty() {
            self.groups.remove(&key);
        }
        if self.groups.is_empty() {
            self.active = false;
        }
        true
    }

    /// Flag the group holding `key` for re-upload.
    pub fn mark_dirty(&mut self, key: GroupKey) {
        if let Some(group) = self.groups.get_mut(&key) {
            group.dirty = true;
        }
    }

    /// Release every batch. The groups stay and upload again when prepared.
    pub fn deactivate(&mut self) {
        for group in self.groups.values_mut() {
            group.batch = None;
            group.dirty = true;
        }
        self.active = false;
    }

    pub fn group(&self, key: GroupKey) -> Option<&SpriteGroup<B>> {
        self.groups.get(&key)
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupKey, &SpriteGroup<B>)> + '_ {
        self.groups.iter().map(|(key, group)| (*key, group))
    }

    /// Uploaded batches ordered by texture array.
    pub fn batches(&self) -> Vec<(GroupKey, &B)> {
        let mut batches: Vec<_> = self
            .groups
            .iter()
            .filter_map(|(key, group)| group.batch.as_ref().map(|batch| (*key, batch)))
            .collect();
        batches.sort_by_key(|(key, _)| *key);
        batches
    }

    pub fn is_dirty(&self) -> bool {
        self.groups.values().any(|group| group.dirty)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of sprites across all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(SpriteGroup::len).sum()
    }
}

impl<B> Default for OpaquePool<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Translucent sprites of one cell, kept sorted by ascending layer.
#[derive(Debug)]
pub struct TranslucentPool<B> {
    pub(crate) sprites: Vec<SpriteHandle>,
    /// One batch per run of equal texture arrays, in draw order.
    pub(crate) batches: Vec<(GroupKey, B)>,
    pub(crate) dirty: bool,
    pub(crate) active: bool,
}

impl<B> TranslucentPool<B> {
    pub fn new() -> Self {
        Self {
            sprites: Vec::new(),
            batches: Vec::new(),
            dirty: false,
            active: false,
        }
    }

    /// Add a sprite. Its object must already be in `store`.
    pub fn insert(&mut self, handle: SpriteHandle, store: &SpriteStore) {
        self.sprites.push(handle);
        self.resort(store);
        self.active = true;
    }

    /// Returns whether the sprite was a member.
    pub fn remove(&mut self, handle: SpriteHandle) -> bool {
        let Some(pos) = self.sprites.iter().position(|&h| h == handle) else {
            return false;
        };
        self.sprites.remove(pos);
        self.dirty = true;
        if self.sprites.is_empty() {
            self.batches.clear();
            self.active = false;
        }
        true
    }

    /// Restore layer order after a layer change.
    pub fn resort(&mut self, store: &SpriteStore) {
        self.sprites
            .sort_by(|a, b| store.get(a.0).layer.total_cmp(&store.get(b.0).layer));
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn deactivate(&mut self) {
        self.batches.clear();
        self.dirty = true;
        self.active = false;
    }

    /// Members in draw order.
    pub fn sprites(&self) -> &[SpriteHandle] {
        &self.sprites
    }

    pub fn batches(&self) -> impl Iterator<Item = (GroupKey, &B)> + '_ {
        self.batches.iter().map(|(key, batch)| (*key, batch))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }
}

impl<B> Default for TranslucentPool<B> {
    fn default() -> Self {
        Self::new()
    }
}
