//! Ordered, de-duplicated ID collections shared by the feed and the
//! interaction sets.

use std::collections::HashSet;

use crate::models::ItemId;

/// Insertion-ordered set of item IDs.
///
/// Order is only used to list the starred feed in the order stories were
/// starred. Two sets are equal when they hold the same members.
#[derive(Debug, Clone, Default)]
pub struct IdSet {
    order: Vec<ItemId>,
    members: HashSet<ItemId>,
}

impl PartialEq for IdSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for IdSet {}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.members.contains(&id)
    }

    /// Returns `false` if the ID was already present.
    pub fn insert(&mut self, id: ItemId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push(id);
        true
    }

    /// Returns `false` if the ID was not present.
    pub fn remove(&mut self, id: ItemId) -> bool {
        if !self.members.remove(&id) {
            return false;
        }
        self.order.retain(|&existing| existing != id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.order.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<ItemId> {
        self.order.clone()
    }

    pub fn as_hash_set(&self) -> &HashSet<ItemId> {
        &self.members
    }
}

impl FromIterator<ItemId> for IdSet {
    fn from_iter<T: IntoIterator<Item = ItemId>>(iter: T) -> Self {
        let mut set = IdSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Appends the IDs from `incoming` that `target` does not already hold,
/// preserving their order. Returns how many were added.
pub fn append_unique(target: &mut Vec<ItemId>, incoming: impl IntoIterator<Item = ItemId>) -> usize {
    let mut seen: HashSet<ItemId> = target.iter().copied().collect();
    let before = target.len();
    for id in incoming {
        if seen.insert(id) {
            target.push(id);
        }
    }
    target.len() - before
}

/// Removes duplicates, keeping the first occurrence.
pub fn dedup_ids(ids: impl IntoIterator<Item = ItemId>) -> Vec<ItemId> {
    let mut out = Vec::new();
    append_unique(&mut out, ids);
    out
}

/// The ID sequence with every hidden ID removed.
pub fn without_hidden(ids: &[ItemId], hidden: &HashSet<ItemId>) -> Vec<ItemId> {
    ids.iter().copied().filter(|id| !hidden.contains(id)).collect()
}
