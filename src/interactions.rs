use anyhow::Result;
use std::collections::HashSet;
use tracing::warn;

use crate::db::InteractionStore;
use crate::ids::IdSet;
use crate::models::{FeedEntry, Item, ItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Read,
    Starred,
    Hidden,
}

impl InteractionKind {
    pub fn key(&self) -> &'static str {
        match self {
            InteractionKind::Read => "readStories",
            InteractionKind::Starred => "starredStories",
            InteractionKind::Hidden => "hiddenStories",
        }
    }
}

/// The three per-user ID sets. Membership is the only state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionSets {
    pub read: IdSet,
    pub starred: IdSet,
    pub hidden: IdSet,
}

impl InteractionSets {
    fn set(&self, kind: InteractionKind) -> &IdSet {
        match kind {
            InteractionKind::Read => &self.read,
            InteractionKind::Starred => &self.starred,
            InteractionKind::Hidden => &self.hidden,
        }
    }

    fn set_mut(&mut self, kind: InteractionKind) -> &mut IdSet {
        match kind {
            InteractionKind::Read => &mut self.read,
            InteractionKind::Starred => &mut self.starred,
            InteractionKind::Hidden => &mut self.hidden,
        }
    }
}

/// Owns the interaction sets and writes every change through to the store.
///
/// Each mutation reads the current set, computes the new one, persists it and
/// only then swaps it in, all under `&mut self`, so rapid toggles cannot lose
/// updates. A failed write leaves the in-memory set unchanged.
pub struct Interactions<S: InteractionStore> {
    sets: InteractionSets,
    store: S,
}

impl<S: InteractionStore> Interactions<S> {
    /// Loads all three sets; unreadable keys start empty.
    pub fn load(store: S) -> Self {
        let mut sets = InteractionSets::default();
        for kind in [InteractionKind::Read, InteractionKind::Starred, InteractionKind::Hidden] {
            match store.get(kind.key()) {
                Ok(ids) => *sets.set_mut(kind) = ids.into_iter().collect(),
                Err(e) => warn!(key = kind.key(), "failed to load interaction set: {:#}", e),
            }
        }
        Self { sets, store }
    }

    pub fn sets(&self) -> &InteractionSets {
        &self.sets
    }

    pub fn is_read(&self, id: ItemId) -> bool {
        self.sets.read.contains(id)
    }

    pub fn is_starred(&self, id: ItemId) -> bool {
        self.sets.starred.contains(id)
    }

    pub fn is_hidden(&self, id: ItemId) -> bool {
        self.sets.hidden.contains(id)
    }

    pub fn hidden_ids(&self) -> &HashSet<ItemId> {
        self.sets.hidden.as_hash_set()
    }

    /// Snapshot of the starred IDs in the order they were starred.
    pub fn starred_ids(&self) -> Vec<ItemId> {
        self.sets.starred.to_vec()
    }

    pub fn mark_read(&mut self, id: ItemId) -> Result<()> {
        self.update(InteractionKind::Read, |set| {
            set.insert(id);
        })
    }

    /// Flips the starred state and returns the new one.
    pub fn toggle_star(&mut self, id: ItemId) -> Result<bool> {
        let now_starred = !self.is_starred(id);
        self.update(InteractionKind::Starred, |set| {
            if now_starred {
                set.insert(id);
            } else {
                set.remove(id);
            }
        })?;
        Ok(now_starred)
    }

    pub fn hide(&mut self, id: ItemId) -> Result<()> {
        self.update(InteractionKind::Hidden, |set| {
            set.insert(id);
        })
    }

    /// Display copy of `item` with flags taken from the current sets.
    pub fn annotate(&self, item: Item) -> FeedEntry {
        FeedEntry {
            is_read: self.is_read(item.id),
            is_starred: self.is_starred(item.id),
            item,
        }
    }

    fn update(&mut self, kind: InteractionKind, change: impl FnOnce(&mut IdSet)) -> Result<()> {
        let mut next = self.sets.set(kind).clone();
        change(&mut next);
        if &next == self.sets.set(kind) {
            return Ok(());
        }
        self.store.set(kind.key(), &next.to_vec())?;
        *self.sets.set_mut(kind) = next;
        Ok(())
    }
}
