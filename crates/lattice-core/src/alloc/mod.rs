//! Allocation and collection types for Lattice.
//!
//! This module provides:
//! - Re-exports of optimized hash collections using AHash
//! - [`ObjectPool`], a bucketed allocator handing out stable, generation-checked handles

pub mod object_pool;

pub use object_pool::{AllocError, ObjectHandle, ObjectPool};

// Re-export optimized hash collections
pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

/// Type alias for the standard HashMap with AHash for better performance.
pub type AHashMap<K, V> = ahash::AHashMap<K, V>;

/// Type alias for the standard HashSet with AHash for better performance.
pub type AHashSet<T> = ahash::AHashSet<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_ahash() {
        let mut map = HashMap::new();
        map.insert((1, -1), "cell");
        assert_eq!(map.get(&(1, -1)), Some(&"cell"));
    }

    #[test]
    fn test_hashset_ahash() {
        let mut set = HashSet::new();
        set.insert(42);
        assert!(set.contains(&42));
    }
}
