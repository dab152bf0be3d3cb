//! Ordering strategy for the skip-list, playing the role of spec.md §6.3's
//! `Cmp = less` template parameter.

use std::marker::PhantomData;

/// Decides relative order between two keys for the skip-list's ascending
/// layer-0 chain.
pub trait Comparator<K>: Default + Send + Sync {
    fn is_less(&self, a: &K, b: &K) -> bool;
}

/// The default comparator: `K`'s own `Ord` impl, ascending.
#[derive(Debug, Clone, Copy)]
pub struct Less<K>(PhantomData<fn(&K)>);

impl<K> Default for Less<K> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<K: Ord> Comparator<K> for Less<K> {
    #[inline]
    fn is_less(&self, a: &K, b: &K) -> bool {
        a < b
    }
}
