//! Feed paginator: infinite-scroll listing over an upstream ID ranking.
//!
//! IDs are pulled in batches and pages are cut from the hidden-filtered ID
//! list. Accumulated entries never repeat an ID. Read/starred flags on
//! entries are display copies; [`Interactions`] stays authoritative.

use anyhow::Result;
use futures::future;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::FeedSettings;
use crate::db::InteractionStore;
use crate::error::FetchError;
use crate::hn_client::ItemSource;
use crate::ids::{append_unique, dedup_ids, without_hidden};
use crate::interactions::Interactions;
use crate::models::{FeedEntry, FeedKind, Generation, Item, ItemId};

/// Captured by [`Feed::begin_init`]. Local feeds carry their IDs with them.
#[derive(Debug, Clone)]
pub struct InitTicket {
    pub generation: Generation,
    pub kind: FeedKind,
    pub local_ids: Option<Vec<ItemId>>,
    pub batch: usize,
}

/// Captured by [`Feed::begin_page`].
#[derive(Debug, Clone)]
pub struct PageTicket {
    pub generation: Generation,
    pub kind: FeedKind,
    pub ids: Vec<ItemId>,
    pub hidden: HashSet<ItemId>,
    pub start: usize,
    pub page_size: usize,
    /// Upstream offset to top the ID list up from before cutting the page.
    pub top_up_from: Option<usize>,
    pub batch: usize,
}

/// Result of [`fetch_page`].
#[derive(Debug, Clone)]
pub struct PageBatch {
    /// The ID list after any top-up.
    pub ids: Vec<ItemId>,
    pub upstream_offset: Option<usize>,
    pub items: Vec<Item>,
    /// Raw IDs consumed once this page is committed.
    pub cursor: usize,
    pub end: usize,
    pub visible_len: usize,
    /// Set when a requested top-up failed, so `visible_len` may be short.
    pub top_up_error: Option<FetchError>,
}

pub enum FeedTicket {
    Init(InitTicket),
    Page(PageTicket),
}

pub struct Feed {
    kind: FeedKind,
    /// Feed an init was requested for and has not committed yet.
    pending: Option<FeedKind>,
    settings: FeedSettings,
    generation: Generation,
    all_ids: Vec<ItemId>,
    upstream_offset: usize,
    /// Position in `all_ids` up to which pages have been cut.
    cursor: usize,
    entries: Vec<FeedEntry>,
    next_page: usize,
    initialized: bool,
    exhausted: bool,
    loading: bool,
    error: Option<String>,
}

impl Feed {
    pub fn new(kind: FeedKind, settings: FeedSettings) -> Self {
        Self {
            kind,
            pending: None,
            settings,
            generation: Generation::default(),
            all_ids: Vec::new(),
            upstream_offset: 0,
            cursor: 0,
            entries: Vec::new(),
            next_page: 0,
            initialized: false,
            exhausted: false,
            loading: false,
            error: None,
        }
    }

    /// The feed whose entries are currently held.
    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// The feed last asked for, committed or not.
    pub fn requested_kind(&self) -> FeedKind {
        self.pending.unwrap_or(self.kind)
    }

    /// True while the held entries belong to a different feed than the one
    /// last asked for.
    pub fn is_switching(&self) -> bool {
        self.pending.is_some_and(|kind| kind != self.kind)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn all_ids(&self) -> &[ItemId] {
        &self.all_ids
    }

    pub fn next_page(&self) -> usize {
        self.next_page
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn has_more(&self) -> bool {
        self.initialized && !self.exhausted
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Starts loading `kind` and abandons anything in flight. The current
    /// entries stay in place until the new ID list arrives.
    pub fn begin_init<S: InteractionStore>(
        &mut self,
        kind: FeedKind,
        interactions: &Interactions<S>,
    ) -> InitTicket {
        self.generation = self.generation.next();
        self.pending = Some(kind);
        self.loading = true;
        self.error = None;

        let local_ids = match kind {
            FeedKind::Starred => Some(interactions.starred_ids()),
            _ => None,
        };

        InitTicket {
            generation: self.generation,
            kind,
            local_ids,
            batch: self.settings.id_batch,
        }
    }

    pub fn finish_init(&mut self, ticket: &InitTicket, result: Result<Vec<ItemId>, FetchError>) -> bool {
        if ticket.generation != self.generation {
            debug!(feed = ticket.kind.label(), "dropping ids for abandoned feed");
            return false;
        }
        self.loading = false;

        match result {
            Ok(ids) => {
                info!(feed = ticket.kind.label(), count = ids.len(), "initialised feed");
                self.kind = ticket.kind;
                self.pending = None;
                self.all_ids = dedup_ids(ids);
                self.upstream_offset = ticket.batch;
                self.cursor = 0;
                self.entries.clear();
                self.next_page = 0;
                self.exhausted = self.all_ids.is_empty();
                self.initialized = true;
                self.error = None;
            }
            Err(FetchError::Cancelled) => {}
            Err(e) => {
                warn!(feed = ticket.kind.label(), "failed to load feed ids: {}", e);
                self.error = Some(e.user_message());
            }
        }
        true
    }

    /// Claims the next page. `None` while a fetch is running, before the
    /// feed is initialised, or once it is exhausted.
    pub fn begin_page<S: InteractionStore>(&mut self, interactions: &Interactions<S>) -> Option<PageTicket> {
        if self.loading || self.exhausted || !self.initialized || self.is_switching() {
            return None;
        }

        let hidden = interactions.hidden_ids().clone();
        let page_size = self.settings.page_size;
        // The page starts right after the last ID already paged, even if
        // earlier entries were hidden since.
        let consumed = &self.all_ids[..self.cursor.min(self.all_ids.len())];
        let start = consumed.iter().filter(|id| !hidden.contains(id)).count();
        let visible_len = self.all_ids.iter().filter(|id| !hidden.contains(id)).count();

        let top_up_from = if !self.kind.is_local() && start + page_size >= visible_len {
            Some(self.upstream_offset)
        } else {
            None
        };

        self.loading = true;
        self.error = None;

        Some(PageTicket {
            generation: self.generation,
            kind: self.kind,
            ids: self.all_ids.clone(),
            hidden,
            start,
            page_size,
            top_up_from,
            batch: self.settings.id_batch,
        })
    }

    pub fn finish_page<S: InteractionStore>(
        &mut self,
        ticket: &PageTicket,
        result: Result<PageBatch, FetchError>,
        interactions: &Interactions<S>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(feed = ticket.kind.label(), "dropping page for abandoned feed");
            return false;
        }
        self.loading = false;

        let batch = match result {
            Ok(batch) => batch,
            Err(FetchError::Cancelled) => return true,
            Err(e) => {
                warn!(feed = ticket.kind.label(), page = self.next_page, "failed to load page: {}", e);
                self.error = Some(e.user_message());
                return true;
            }
        };

        self.all_ids = batch.ids;
        self.cursor = batch.cursor;
        if let Some(offset) = batch.upstream_offset {
            self.upstream_offset = offset;
        }

        let mut known: HashSet<ItemId> = self.entries.iter().map(|entry| entry.item.id).collect();
        let mut added = 0;
        for item in batch.items {
            if interactions.is_hidden(item.id) || !known.insert(item.id) {
                continue;
            }
            if self.kind == FeedKind::Starred && !interactions.is_starred(item.id) {
                continue;
            }
            self.entries.push(interactions.annotate(item));
            added += 1;
        }

        self.next_page += 1;
        let reached_end = batch.end >= batch.visible_len;
        // The end of a list that could not be topped up is not the end of
        // the feed.
        self.exhausted = reached_end && batch.top_up_error.is_none();
        self.error = match batch.top_up_error {
            Some(e) if reached_end => Some(e.user_message()),
            _ => None,
        };

        debug!(
            feed = ticket.kind.label(),
            added,
            total = self.entries.len(),
            exhausted = self.exhausted,
            "committed page"
        );
        true
    }

    /// Re-issues whichever top-level operation last failed.
    pub fn retry<S: InteractionStore>(&mut self, interactions: &Interactions<S>) -> Option<FeedTicket> {
        self.error.as_ref()?;
        if let Some(kind) = self.pending {
            return Some(FeedTicket::Init(self.begin_init(kind, interactions)));
        }
        if !self.initialized {
            return Some(FeedTicket::Init(self.begin_init(self.kind, interactions)));
        }
        self.begin_page(interactions).map(FeedTicket::Page)
    }

    pub fn mark_read<S: InteractionStore>(&mut self, interactions: &mut Interactions<S>, id: ItemId) -> Result<()> {
        interactions.mark_read(id)?;
        project_read(&mut self.entries, id);
        Ok(())
    }

    /// Returns the new starred state. Unstarring inside the starred feed
    /// removes the entry.
    pub fn toggle_star<S: InteractionStore>(
        &mut self,
        interactions: &mut Interactions<S>,
        id: ItemId,
    ) -> Result<bool> {
        let starred = interactions.toggle_star(id)?;
        if self.kind == FeedKind::Starred && !starred {
            remove_entry(&mut self.entries, id);
        } else {
            project_starred(&mut self.entries, id, starred);
        }
        Ok(starred)
    }

    pub fn hide_item<S: InteractionStore>(&mut self, interactions: &mut Interactions<S>, id: ItemId) -> Result<()> {
        interactions.hide(id)?;
        remove_entry(&mut self.entries, id);
        Ok(())
    }

    /// Re-reads every entry's flags after the sets were changed from
    /// another view.
    pub fn sync_flags<S: InteractionStore>(&mut self, interactions: &Interactions<S>) {
        let starred_only = self.kind == FeedKind::Starred;
        self.entries.retain(|entry| {
            let id = entry.item.id;
            !interactions.is_hidden(id) && (!starred_only || interactions.is_starred(id))
        });
        refresh_flags(&mut self.entries, interactions);
    }

    /// Runs a whole initialisation against `source`.
    pub async fn init_feed<S: InteractionStore>(
        &mut self,
        source: &dyn ItemSource,
        kind: FeedKind,
        interactions: &Interactions<S>,
    ) -> bool {
        let ticket = self.begin_init(kind, interactions);
        let result = fetch_initial_ids(source, &ticket).await;
        self.finish_init(&ticket, result);
        self.initialized && self.pending.is_none()
    }

    /// Runs a whole page fetch against `source`. Returns `false` when the
    /// call was a no-op or left an error behind.
    pub async fn fetch_next_page<S: InteractionStore>(
        &mut self,
        source: &dyn ItemSource,
        interactions: &Interactions<S>,
    ) -> bool {
        let Some(ticket) = self.begin_page(interactions) else {
            return false;
        };
        let result = fetch_page(source, &ticket).await;
        self.finish_page(&ticket, result, interactions) && self.error.is_none()
    }
}

/// First batch of IDs for the ticket's feed.
pub async fn fetch_initial_ids(source: &dyn ItemSource, ticket: &InitTicket) -> Result<Vec<ItemId>, FetchError> {
    if let Some(ids) = &ticket.local_ids {
        return Ok(ids.clone());
    }
    let ids = source.fetch_feed_ids(ticket.kind).await?;
    Ok(ids.into_iter().take(ticket.batch).collect())
}

/// Tops the ID list up if the ticket asks for it, then fetches the page
/// window concurrently.
///
/// Failed items are left out. The page fails only when its window was
/// non-empty and not a single item could be fetched.
pub async fn fetch_page(source: &dyn ItemSource, ticket: &PageTicket) -> Result<PageBatch, FetchError> {
    let mut ids = ticket.ids.clone();
    let mut upstream_offset = None;
    let mut top_up_error = None;

    if let Some(offset) = ticket.top_up_from {
        match source.fetch_feed_ids(ticket.kind).await {
            Ok(upstream) => {
                let batch: Vec<ItemId> = upstream.into_iter().skip(offset).take(ticket.batch).collect();
                let fetched = batch.len();
                let added = append_unique(&mut ids, batch);
                upstream_offset = Some(offset + fetched);
                debug!(feed = ticket.kind.label(), added, "topped up feed ids");
            }
            Err(e) => {
                warn!(feed = ticket.kind.label(), "failed to top up feed ids: {}", e);
                top_up_error = Some(e);
            }
        }
    }

    let visible = without_hidden(&ids, &ticket.hidden);
    let start = ticket.start.min(visible.len());
    let end = (start + ticket.page_size).min(visible.len());
    let window = &visible[start..end];

    let cursor = match window.last() {
        Some(last) => ids.iter().position(|id| id == last).map_or(ids.len(), |pos| pos + 1),
        None => ids.len(),
    };

    let (items, first_error) = fetch_items(source, window).await;
    if items.is_empty() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    Ok(PageBatch {
        ids,
        upstream_offset,
        items,
        cursor,
        end,
        visible_len: visible.len(),
        top_up_error,
    })
}

/// Fetches `ids` concurrently, keeping successes in order. Also returns the
/// first failure, if any.
pub(crate) async fn fetch_items(source: &dyn ItemSource, ids: &[ItemId]) -> (Vec<Item>, Option<FetchError>) {
    let results = future::join_all(ids.iter().map(|&id| source.fetch_item(id))).await;

    let mut items = Vec::with_capacity(results.len());
    let mut first_error = None;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(Some(item)) if !item.deleted && !item.dead => items.push(item),
            Ok(_) => debug!(id, "skipping missing or removed item"),
            Err(e) => {
                warn!(id, "item fetch failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }
    (items, first_error)
}

pub(crate) fn project_read(entries: &mut [FeedEntry], id: ItemId) {
    if let Some(entry) = entries.iter_mut().find(|entry| entry.item.id == id) {
        entry.is_read = true;
    }
}

pub(crate) fn project_starred(entries: &mut [FeedEntry], id: ItemId, starred: bool) {
    if let Some(entry) = entries.iter_mut().find(|entry| entry.item.id == id) {
        entry.is_starred = starred;
    }
}

pub(crate) fn refresh_flags<S: InteractionStore>(entries: &mut [FeedEntry], interactions: &Interactions<S>) {
    for entry in entries {
        entry.is_read = interactions.is_read(entry.item.id);
        entry.is_starred = interactions.is_starred(entry.item.id);
    }
}

pub(crate) fn remove_entry(entries: &mut Vec<FeedEntry>, id: ItemId) {
    entries.retain(|entry| entry.item.id != id);
}
