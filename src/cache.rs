use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::Item;

/// Items already shown on the page, keyed by id.
///
/// Owned by the UI thread and handed to each feed by reference.
#[derive(Debug, Clone, Default)]
pub struct PostCache {
    entries: HashMap<i64, Item>,
}

impl PostCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `item`, replacing any previous entry. Items without an id are ignored.
    pub fn add(&mut self, item: &Item) {
        if item.id == 0 {
            return;
        }
        self.entries.insert(item.id, item.clone());
    }

    pub fn has(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&Item> {
        self.entries.get(&id)
    }

    pub fn remove(&mut self, id: i64) -> Option<Item> {
        self.entries.remove(&id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a feed does to the shared cache when it is collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    #[default]
    Retain,
    ClearOnCollapse,
}

impl CachePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "retain" => Some(CachePolicy::Retain),
            "clear_on_collapse" | "clear" => Some(CachePolicy::ClearOnCollapse),
            _ => None,
        }
    }

    pub fn apply(&self, cache: &mut PostCache) {
        if matches!(self, CachePolicy::ClearOnCollapse) {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::story;

    #[test]
    fn add_ignores_items_without_id() {
        let mut cache = PostCache::new();
        cache.add(&Item::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn add_overwrites_existing_entry() {
        let mut cache = PostCache::new();
        cache.add(&story(7, 100));
        let mut updated = story(7, 100);
        updated.score = Some(42);
        cache.add(&updated);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(7).and_then(|item| item.score), Some(42));
    }

    #[test]
    fn clear_empties_and_ids_are_sorted() {
        let mut cache = PostCache::new();
        cache.add(&story(3, 1));
        cache.add(&story(1, 2));
        assert_eq!(cache.ids(), vec![1, 3]);
        assert!(cache.has(3));
        cache.clear();
        assert!(!cache.has(3));
        assert!(cache.ids().is_empty());
    }

    #[test]
    fn remove_drops_a_single_entry() {
        let mut cache = PostCache::new();
        cache.add(&story(1, 1));
        cache.add(&story(2, 2));
        assert_eq!(cache.remove(1).map(|item| item.id), Some(1));
        assert_eq!(cache.remove(1), None);
        assert_eq!(cache.ids(), vec![2]);
    }

    #[test]
    fn policy_only_clears_when_asked() {
        let mut cache = PostCache::new();
        cache.add(&story(1, 1));
        CachePolicy::Retain.apply(&mut cache);
        assert_eq!(cache.len(), 1);
        CachePolicy::ClearOnCollapse.apply(&mut cache);
        assert!(cache.is_empty());
    }
}
