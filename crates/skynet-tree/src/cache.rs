use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

use skynet_vector::VectorStore;

use crate::builder::{TopicTree, TopicTreeBuilder};

/// Lazily built, shared topic tree.
///
/// The lock is held for the whole build, so callers racing on a cold cache
/// wait for the first build and then share its result. Callers only ever see
/// a complete tree.
pub struct TopicTreeCache {
    builder: TopicTreeBuilder,
    slot: Mutex<Option<Arc<TopicTree>>>,
    // Readable while a build holds `slot`.
    ready: AtomicBool,
    builds: AtomicUsize,
}

impl TopicTreeCache {
    pub fn new(builder: TopicTreeBuilder) -> Self {
        Self { builder, slot: Mutex::new(None), ready: AtomicBool::new(false), builds: AtomicUsize::new(0) }
    }

    /// The cached tree for `store`, building it if absent or built from another snapshot.
    pub fn get_or_build(&self, store: &VectorStore) -> Arc<TopicTree> {
        let mut slot = self.slot.lock();
        if let Some(tree) = slot.as_ref() {
            if tree.fingerprint == store.fingerprint() {
                return Arc::clone(tree);
            }
            info!("store changed since last build; rebuilding topic tree");
        }
        let tree = Arc::new(self.builder.build(store));
        self.builds.fetch_add(1, Ordering::Relaxed);
        *slot = Some(Arc::clone(&tree));
        self.ready.store(true, Ordering::Release);
        tree
    }

    pub fn cached(&self) -> Option<Arc<TopicTree>> { self.slot.lock().clone() }

    /// Whether a tree is cached. Never waits on a build in progress.
    pub fn is_cached(&self) -> bool { self.ready.load(Ordering::Acquire) }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        *slot = None;
        self.ready.store(false, Ordering::Release);
    }

    /// Number of builds performed so far.
    pub fn build_count(&self) -> usize { self.builds.load(Ordering::Relaxed) }
}

impl Default for TopicTreeCache {
    fn default() -> Self { Self::new(TopicTreeBuilder::default()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_flag_does_not_wait_for_the_build_lock() {
        let cache = TopicTreeCache::default();
        let store = VectorStore::empty(4);
        assert!(!cache.is_cached());

        cache.get_or_build(&store);
        let held = cache.slot.lock();
        assert!(cache.is_cached());
        drop(held);

        cache.invalidate();
        assert!(!cache.is_cached());
        assert!(cache.cached().is_none());
    }
}
