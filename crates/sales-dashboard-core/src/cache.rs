use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;

use crate::{apply_filters, compute_views, DashboardViews, FilterSelection, RecordStore};

#[derive(Debug, Clone, Copy, Default, Serialize, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Read-through cache of aggregate views keyed by filter selection.
///
/// Entries never go stale: the record store is immutable for the life of the
/// cache. Callers must use one cache per store.
#[derive(Debug, Default)]
pub struct ViewCache {
    entries: HashMap<FilterSelection, Option<DashboardViews>>,
    hits: u64,
    misses: u64,
}

impl ViewCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, selection: &FilterSelection) -> bool {
        self.entries.contains_key(selection)
    }

    /// Returns the views for `selection`, computing them on first request.
    /// `None` means the selection matches no records.
    pub fn get_or_compute(
        &mut self,
        store: &RecordStore,
        selection: &FilterSelection,
    ) -> Option<&DashboardViews> {
        match self.entries.entry(selection.clone()) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                entry.into_mut().as_ref()
            }
            Entry::Vacant(entry) => {
                self.misses += 1;
                let views = compute_views(&apply_filters(store, selection));
                entry.insert(views).as_ref()
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}
