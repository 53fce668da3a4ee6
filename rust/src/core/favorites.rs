use std::collections::{BTreeSet, HashMap};

/// Favorites of the current identity plus public per-listing counters. Writes are
/// applied optimistically; `replace` reconciles with the backend's answer.
#[derive(Debug, Default)]
pub(crate) struct FavoritesCounter {
    favorites: BTreeSet<String>,
    count: u32,
    listing_counts: HashMap<String, u32>,
}

impl FavoritesCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn is_favorite(&self, listing_id: &str) -> bool {
        self.favorites.contains(listing_id)
    }

    pub(crate) fn listing_ids(&self) -> Vec<String> {
        self.favorites.iter().cloned().collect()
    }

    /// Flips the flag and returns the new value.
    pub(crate) fn toggle(&mut self, listing_id: &str) -> bool {
        let next = !self.is_favorite(listing_id);
        self.set(listing_id, next);
        next
    }

    /// Returns true if the flag actually changed.
    pub(crate) fn set(&mut self, listing_id: &str, favorited: bool) -> bool {
        let changed = if favorited {
            self.favorites.insert(listing_id.to_string())
        } else {
            self.favorites.remove(listing_id)
        };
        if changed {
            self.count = if favorited {
                self.count.saturating_add(1)
            } else {
                self.count.saturating_sub(1)
            };
        }
        changed
    }

    pub(crate) fn replace(&mut self, listing_ids: impl IntoIterator<Item = String>) {
        self.favorites = listing_ids.into_iter().collect();
        self.count = self.favorites.len() as u32;
    }

    pub(crate) fn listing_counts(&self) -> &HashMap<String, u32> {
        &self.listing_counts
    }

    pub(crate) fn set_listing_count(&mut self, listing_id: &str, count: u32) {
        self.listing_counts.insert(listing_id.to_string(), count);
    }

    pub(crate) fn increment_listing_count(&mut self, listing_id: &str) {
        let c = self.listing_counts.entry(listing_id.to_string()).or_insert(0);
        *c = c.saturating_add(1);
    }

    pub(crate) fn decrement_listing_count(&mut self, listing_id: &str) {
        let c = self.listing_counts.entry(listing_id.to_string()).or_insert(0);
        *c = c.saturating_sub(1);
    }

    pub(crate) fn reset(&mut self) {
        self.favorites.clear();
        self.count = 0;
        self.listing_counts.clear();
    }
}
