// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::num::NonZeroUsize;

use lru::LruCache;

/// Bounded set of identifiers evicting the least recently added entry.
///
/// Lookups use `contains`, which leaves the recency order untouched, and a
/// present identifier is never pushed again, so the order is insertion order.
#[derive(Debug)]
pub struct SeenSet {
    entries: LruCache<String, ()>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Restores a set from its persisted form, oldest first.
    pub fn from_persisted(ids: Vec<String>, capacity: usize) -> Self {
        let mut set = Self::new(capacity);
        for id in ids {
            set.insert(id);
        }
        set
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(id)
    }

    /// Returns false when the identifier was already present.
    pub fn insert(&mut self, id: String) -> bool {
        if self.entries.contains(&id) {
            return false;
        }
        self.entries.push(id, ());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers oldest first.
    pub fn to_persisted(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(id, _)| id.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
