use std::collections::HashSet;
use std::sync::Arc;

/// Immutable view of one membership set. Every effective mutation produces a new `Arc`,
/// so consumers can detect change with `Arc::ptr_eq`.
pub(crate) type BlockSnapshot = Arc<HashSet<String>>;

/// Block relationships of the current identity. Purely local: population comes from the
/// actor after an authoritative fetch, and writes are applied before the backend confirms.
#[derive(Debug, Clone, Default)]
pub(crate) struct BlockListCache {
    blocked_by_me: BlockSnapshot,
    blocking_me: BlockSnapshot,
}

impl BlockListCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Has the current identity blocked `user_id`?
    pub(crate) fn is_blocked(&self, user_id: &str) -> bool {
        self.blocked_by_me.contains(user_id)
    }

    /// Has `user_id` blocked the current identity?
    pub(crate) fn is_blocked_by(&self, user_id: &str) -> bool {
        self.blocking_me.contains(user_id)
    }

    pub(crate) fn blocked_by_me(&self) -> &BlockSnapshot {
        &self.blocked_by_me
    }

    pub(crate) fn blocking_me(&self) -> &BlockSnapshot {
        &self.blocking_me
    }

    pub(crate) fn add_blocked(&mut self, user_id: &str) -> BlockSnapshot {
        self.blocked_by_me = with_member(&self.blocked_by_me, user_id);
        self.blocked_by_me.clone()
    }

    pub(crate) fn remove_blocked(&mut self, user_id: &str) -> BlockSnapshot {
        self.blocked_by_me = without_member(&self.blocked_by_me, user_id);
        self.blocked_by_me.clone()
    }

    #[cfg(test)]
    pub(crate) fn add_blocking_me(&mut self, user_id: &str) -> BlockSnapshot {
        self.blocking_me = with_member(&self.blocking_me, user_id);
        self.blocking_me.clone()
    }

    #[cfg(test)]
    pub(crate) fn remove_blocking_me(&mut self, user_id: &str) -> BlockSnapshot {
        self.blocking_me = without_member(&self.blocking_me, user_id);
        self.blocking_me.clone()
    }

    pub(crate) fn set_blocked(&mut self, ids: impl IntoIterator<Item = String>) -> BlockSnapshot {
        self.blocked_by_me = Arc::new(ids.into_iter().collect());
        self.blocked_by_me.clone()
    }

    pub(crate) fn set_blocking_me(&mut self, ids: impl IntoIterator<Item = String>) -> BlockSnapshot {
        self.blocking_me = Arc::new(ids.into_iter().collect());
        self.blocking_me.clone()
    }

    pub(crate) fn reset(&mut self) {
        self.blocked_by_me = BlockSnapshot::default();
        self.blocking_me = BlockSnapshot::default();
    }

    /// Sorted copy of `blocked_by_me` for the UI snapshot.
    pub(crate) fn blocked_ids_sorted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.blocked_by_me.iter().cloned().collect();
        ids.sort();
        ids
    }
}

fn with_member(set: &BlockSnapshot, user_id: &str) -> BlockSnapshot {
    if set.contains(user_id) {
        return set.clone();
    }
    let mut next = HashSet::with_capacity(set.len() + 1);
    next.extend(set.iter().cloned());
    next.insert(user_id.to_string());
    Arc::new(next)
}

fn without_member(set: &BlockSnapshot, user_id: &str) -> BlockSnapshot {
    if !set.contains(user_id) {
        return set.clone();
    }
    Arc::new(set.iter().filter(|id| id.as_str() != user_id).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_visible_immediately() {
        let mut cache = BlockListCache::new();
        assert!(!cache.is_blocked("u2"));
        cache.add_blocked("u2");
        assert!(cache.is_blocked("u2"));
        assert!(!cache.is_blocked_by("u2"));

        cache.add_blocking_me("u3");
        assert!(cache.is_blocked_by("u3"));
        assert!(!cache.is_blocked("u3"));
    }

    #[test]
    fn mutation_produces_new_snapshot() {
        let mut cache = BlockListCache::new();
        let before = cache.blocked_by_me().clone();
        let after = cache.add_blocked("u2");
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!before.contains("u2"));

        // Re-adding an existing member is not a change.
        let again = cache.add_blocked("u2");
        assert!(Arc::ptr_eq(&after, &again));

        let removed = cache.remove_blocked("u2");
        assert!(!Arc::ptr_eq(&again, &removed));
        assert!(again.contains("u2"));
        assert!(!cache.is_blocked("u2"));

        let noop = cache.remove_blocked("nobody");
        assert!(Arc::ptr_eq(&removed, &noop));
    }

    #[test]
    fn reset_clears_everything() {
        let mut cache = BlockListCache::new();
        let ids = ["u1", "u2", "u3"];
        for id in ids {
            cache.add_blocked(id);
            cache.add_blocking_me(id);
        }
        cache.reset();
        for id in ids {
            assert!(!cache.is_blocked(id));
            assert!(!cache.is_blocked_by(id));
        }
    }

    #[test]
    fn setters_replace_wholesale() {
        let mut cache = BlockListCache::new();
        cache.add_blocked("stale");
        cache.set_blocked(vec!["u9".to_string(), "u1".to_string()]);
        cache.set_blocking_me(vec!["u5".to_string()]);
        assert!(!cache.is_blocked("stale"));
        assert_eq!(cache.blocked_ids_sorted(), vec!["u1", "u9"]);
        assert!(cache.is_blocked_by("u5"));

        cache.remove_blocking_me("u5");
        assert!(!cache.is_blocked_by("u5"));
    }
}
