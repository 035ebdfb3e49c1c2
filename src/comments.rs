//! Comment tree engine.
//!
//! A story's comments are fetched a fixed number of levels deep when the story
//! is opened. Below that, each node records that it has unloaded children and
//! fetches exactly one more level when the user expands it. Fetched children
//! are merged back into whatever the tree looks like at that moment, found by
//! ID rather than by a held reference.
//!
//! Expand/collapse and per-node loading flags live in an [`ExpansionOverlay`]
//! next to the tree, so replacing a subtree never loses UI state elsewhere.
//!
//! Network work is split into `begin_*` (captures a ticket), a free async
//! fetch function, and `finish_*` (commits if the ticket is still current).
//! Only the owner of the [`CommentThread`] mutates it.

use futures::future::{self, BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::CommentSettings;
use crate::error::FetchError;
use crate::hn_client::ItemSource;
use crate::models::{CommentNode, Generation, Item, ItemId};

/// Guard against pathological nesting when walking a tree.
const MAX_WALK_DEPTH: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeUiState {
    pub expanded: bool,
    pub loading: bool,
}

impl Default for NodeUiState {
    fn default() -> Self {
        Self {
            expanded: true,
            loading: false,
        }
    }
}

/// Per-node view state keyed by comment ID. Nodes without an entry are
/// expanded and idle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpansionOverlay {
    nodes: HashMap<ItemId, NodeUiState>,
}

impl ExpansionOverlay {
    pub fn get(&self, id: ItemId) -> NodeUiState {
        self.nodes.get(&id).copied().unwrap_or_default()
    }

    pub fn is_expanded(&self, id: ItemId) -> bool {
        self.get(id).expanded
    }

    pub fn is_loading(&self, id: ItemId) -> bool {
        self.get(id).loading
    }

    pub fn set_expanded(&mut self, id: ItemId, expanded: bool) {
        self.nodes.entry(id).or_default().expanded = expanded;
    }

    pub fn set_loading(&mut self, id: ItemId, loading: bool) {
        self.nodes.entry(id).or_default().loading = loading;
    }

    /// Flips `expanded` and returns the new value.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        let state = self.nodes.entry(id).or_default();
        state.expanded = !state.expanded;
        state.expanded
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

/// Captured by [`CommentThread::begin_load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoryTicket {
    pub generation: Generation,
    pub story_id: ItemId,
}

/// Captured by [`CommentThread::begin_expand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandTicket {
    pub generation: Generation,
    pub node_id: ItemId,
    pub child_ids: Vec<ItemId>,
    pub child_depth: usize,
}

/// Story plus its eagerly materialised top level.
#[derive(Debug, Clone)]
pub struct LoadedStory {
    pub story: Item,
    pub nodes: Vec<CommentNode>,
}

/// State of the comment view for one story at a time.
pub struct CommentThread {
    settings: CommentSettings,
    generation: Generation,
    story_id: Option<ItemId>,
    story: Option<Item>,
    nodes: Vec<CommentNode>,
    overlay: ExpansionOverlay,
    in_flight: HashSet<ItemId>,
    visible_top_level: usize,
    loading: bool,
    error: Option<String>,
}

impl CommentThread {
    pub fn new(settings: CommentSettings) -> Self {
        Self {
            visible_top_level: settings.top_level_page,
            settings,
            generation: Generation::default(),
            story_id: None,
            story: None,
            nodes: Vec::new(),
            overlay: ExpansionOverlay::default(),
            in_flight: HashSet::new(),
            loading: false,
            error: None,
        }
    }

    pub fn settings(&self) -> &CommentSettings {
        &self.settings
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn story_id(&self) -> Option<ItemId> {
        self.story_id
    }

    pub fn story(&self) -> Option<&Item> {
        self.story.as_ref()
    }

    pub fn nodes(&self) -> &[CommentNode] {
        &self.nodes
    }

    pub fn overlay(&self) -> &ExpansionOverlay {
        &self.overlay
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_in_flight(&self, id: ItemId) -> bool {
        self.in_flight.contains(&id)
    }

    pub fn find(&self, id: ItemId) -> Option<&CommentNode> {
        find_node(&self.nodes, id)
    }

    /// Top-level nodes inside the current "show more" window.
    pub fn visible_nodes(&self) -> &[CommentNode] {
        let end = self.visible_top_level.min(self.nodes.len());
        &self.nodes[..end]
    }

    pub fn has_more_top_level(&self) -> bool {
        self.visible_top_level < self.nodes.len()
    }

    pub fn show_more_top_level(&mut self) {
        if !self.loading && self.has_more_top_level() {
            self.visible_top_level += self.settings.top_level_page;
        }
    }

    /// Switches to `story_id`, abandoning everything about the previous story.
    pub fn begin_load(&mut self, story_id: ItemId) -> StoryTicket {
        self.generation = self.generation.next();
        self.story_id = Some(story_id);
        self.story = None;
        self.nodes.clear();
        self.overlay.clear();
        self.in_flight.clear();
        self.visible_top_level = self.settings.top_level_page;
        self.loading = true;
        self.error = None;

        StoryTicket {
            generation: self.generation,
            story_id,
        }
    }

    /// Re-issues the load for the current story.
    pub fn retry(&mut self) -> Option<StoryTicket> {
        let story_id = self.story_id?;
        Some(self.begin_load(story_id))
    }

    /// Drops the current story without starting another one.
    pub fn close(&mut self) {
        self.begin_load(0);
        self.story_id = None;
        self.loading = false;
    }

    /// Commits the result of a top-level load. Returns `false` if the ticket
    /// belongs to an abandoned context and the result was dropped.
    pub fn finish_load(&mut self, ticket: &StoryTicket, result: Result<LoadedStory, FetchError>) -> bool {
        if ticket.generation != self.generation {
            debug!(story = ticket.story_id, "dropping comments for abandoned story");
            return false;
        }
        self.loading = false;

        match result {
            Ok(loaded) => {
                info!(
                    story = ticket.story_id,
                    top_level = loaded.nodes.len(),
                    "loaded comment tree"
                );
                self.story = Some(loaded.story);
                self.nodes = loaded.nodes;
                self.error = None;
            }
            Err(FetchError::Cancelled) => {}
            Err(e) => {
                warn!(story = ticket.story_id, "failed to load comments: {}", e);
                self.error = Some(e.user_message());
            }
        }
        true
    }

    /// Claims the right to fetch the replies of `node_id`.
    ///
    /// Returns `None` when there is nothing to do: the node is unknown, its
    /// children are already loaded, or a fetch for it is already running (the
    /// running one will satisfy this request too).
    pub fn begin_expand(&mut self, node_id: ItemId) -> Option<ExpandTicket> {
        if self.in_flight.contains(&node_id) {
            debug!(node = node_id, "expansion already in flight");
            return None;
        }

        let node = find_node(&self.nodes, node_id)?;
        if node.children_loaded || !node.has_unloaded_children {
            return None;
        }

        let ticket = ExpandTicket {
            generation: self.generation,
            node_id,
            child_ids: node.item.child_ids.clone(),
            child_depth: node.depth + 1,
        };

        self.in_flight.insert(node_id);
        self.overlay.set_loading(node_id, true);
        Some(ticket)
    }

    /// Merges fetched replies into the node they were requested for. The
    /// loading flag is cleared whatever came back.
    pub fn finish_expand(&mut self, ticket: &ExpandTicket, mut children: Vec<CommentNode>) -> bool {
        if ticket.generation != self.generation {
            debug!(node = ticket.node_id, "dropping replies for abandoned story");
            return false;
        }

        self.in_flight.remove(&ticket.node_id);
        self.overlay.set_loading(ticket.node_id, false);

        for child in &mut children {
            child.depth = ticket.child_depth;
        }

        if !merge_children_into_tree(&mut self.nodes, ticket.node_id, children) {
            warn!(node = ticket.node_id, "expanded node no longer in tree");
        }
        true
    }

    /// Flips a node open or closed. Opening a node whose replies were never
    /// fetched starts the fetch, unless it sits below the auto-fetch depth.
    pub fn toggle_expansion(&mut self, node_id: ItemId) -> Option<ExpandTicket> {
        let now_expanded = self.overlay.toggle(node_id);
        if !now_expanded {
            return None;
        }

        let node = find_node(&self.nodes, node_id)?;
        if !node.has_unloaded_children || node.depth >= self.settings.max_auto_fetch_depth {
            return None;
        }
        self.begin_expand(node_id)
    }

    /// Claims a fetch for an expanded node whose replies were never loaded,
    /// as long as it sits above the auto-fetch depth. Safe to call every
    /// frame for every visible node.
    pub fn auto_expand(&mut self, node_id: ItemId) -> Option<ExpandTicket> {
        if self.in_flight.contains(&node_id) || !self.overlay.is_expanded(node_id) {
            return None;
        }
        let node = find_node(&self.nodes, node_id)?;
        let below_limit = node.depth < self.settings.max_auto_fetch_depth;
        if node.children_loaded || !node.has_unloaded_children || !below_limit {
            return None;
        }
        self.begin_expand(node_id)
    }

    /// Writes `expanded` for every materialised node. Never fetches.
    pub fn set_all_expanded(&mut self, expanded: bool) {
        let overlay = &mut self.overlay;
        for_each_node(&self.nodes, &mut |node| overlay.set_expanded(node.id(), expanded));
    }

    /// Runs a whole top-level load against `source`.
    pub async fn load_top_level(&mut self, source: &dyn ItemSource, story_id: ItemId) -> bool {
        let ticket = self.begin_load(story_id);
        let result = fetch_story_comments(source, story_id, &self.settings).await;
        self.finish_load(&ticket, result);
        self.error.is_none()
    }

    /// Runs a whole expansion against `source`. Returns `false` when no
    /// fetch was started.
    pub async fn expand_node(&mut self, source: &dyn ItemSource, node_id: ItemId) -> bool {
        let Some(ticket) = self.begin_expand(node_id) else {
            return false;
        };
        let children = fetch_replies(
            source,
            &ticket.child_ids,
            ticket.child_depth,
            self.settings.child_timeout(),
        )
        .await;
        self.finish_expand(&ticket, children)
    }
}

/// Fetches the story and materialises its first `top_level_fanout` comments,
/// `eager_depth` levels deep.
///
/// Fails only if the story itself cannot be fetched.
pub async fn fetch_story_comments(
    source: &dyn ItemSource,
    story_id: ItemId,
    settings: &CommentSettings,
) -> Result<LoadedStory, FetchError> {
    let story = source
        .fetch_item(story_id)
        .await?
        .ok_or_else(|| FetchError::NotFound(format!("story {}", story_id)))?;

    let top_level: Vec<ItemId> = story
        .child_ids
        .iter()
        .copied()
        .take(settings.top_level_fanout)
        .collect();

    let nodes = fetch_level(source, &top_level, 1, settings).await;
    Ok(LoadedStory { story, nodes })
}

/// Fetches one level of replies with a timeout per child. Failed, timed out,
/// missing and tombstoned children are left out.
pub async fn fetch_replies(
    source: &dyn ItemSource,
    child_ids: &[ItemId],
    depth: usize,
    timeout: Duration,
) -> Vec<CommentNode> {
    let fetches = child_ids.iter().map(|&id| async move {
        fetch_comment(source, id, timeout)
            .await
            .map(|item| CommentNode::unloaded(item, depth))
    });

    future::join_all(fetches).await.into_iter().flatten().collect()
}

async fn fetch_level(
    source: &dyn ItemSource,
    ids: &[ItemId],
    depth: usize,
    settings: &CommentSettings,
) -> Vec<CommentNode> {
    let fetches = ids.iter().map(|&id| materialize(source, id, depth, settings));
    future::join_all(fetches).await.into_iter().flatten().collect()
}

fn materialize<'a>(
    source: &'a dyn ItemSource,
    id: ItemId,
    depth: usize,
    settings: &'a CommentSettings,
) -> BoxFuture<'a, Option<CommentNode>> {
    async move {
        let item = fetch_comment(source, id, settings.child_timeout()).await?;
        let mut node = CommentNode::unloaded(item, depth);

        if node.has_unloaded_children && depth <= settings.eager_depth {
            let child_ids = node.item.child_ids.clone();
            let children = fetch_level(source, &child_ids, depth + 1, settings).await;
            node.attach_children(children);
        }
        Some(node)
    }
    .boxed()
}

async fn fetch_comment(source: &dyn ItemSource, id: ItemId, timeout: Duration) -> Option<Item> {
    match tokio::time::timeout(timeout, source.fetch_item(id)).await {
        Ok(Ok(Some(item))) if item.is_tombstone() => {
            debug!(id, "dropping deleted or empty comment");
            None
        }
        Ok(Ok(Some(item))) => Some(item),
        Ok(Ok(None)) => {
            debug!(id, "comment not found");
            None
        }
        Ok(Err(e)) => {
            warn!(id, "comment fetch failed: {}", e);
            None
        }
        Err(_) => {
            warn!(id, "comment fetch timed out");
            None
        }
    }
}

/// Replaces the children of the first node (pre-order) whose ID is
/// `target_id`. Returns `false`, leaving `tree` untouched, if there is none.
pub fn merge_children_into_tree(
    tree: &mut [CommentNode],
    target_id: ItemId,
    new_children: Vec<CommentNode>,
) -> bool {
    let mut visited = HashSet::new();
    match find_node_mut(tree, target_id, &mut visited, 0) {
        Some(node) => {
            node.attach_children(new_children);
            true
        }
        None => false,
    }
}

/// Replies currently materialised below `node`. Unloaded subtrees count as
/// zero; prefer the story's `descendants` for whole-thread totals.
pub fn count_descendants(node: &CommentNode) -> usize {
    node.children
        .iter()
        .map(|child| 1 + count_descendants(child))
        .sum()
}

pub fn find_node(nodes: &[CommentNode], id: ItemId) -> Option<&CommentNode> {
    let mut visited = HashSet::new();
    find_node_in(nodes, id, &mut visited, 0)
}

fn find_node_in<'a>(
    nodes: &'a [CommentNode],
    id: ItemId,
    visited: &mut HashSet<ItemId>,
    depth: usize,
) -> Option<&'a CommentNode> {
    if depth > MAX_WALK_DEPTH {
        return None;
    }
    for node in nodes {
        if !visited.insert(node.id()) {
            continue;
        }
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_node_in(&node.children, id, visited, depth + 1) {
            return Some(found);
        }
    }
    None
}

fn find_node_mut<'a>(
    nodes: &'a mut [CommentNode],
    id: ItemId,
    visited: &mut HashSet<ItemId>,
    depth: usize,
) -> Option<&'a mut CommentNode> {
    if depth > MAX_WALK_DEPTH {
        return None;
    }
    for node in nodes.iter_mut() {
        if !visited.insert(node.id()) {
            continue;
        }
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_node_mut(&mut node.children, id, visited, depth + 1) {
            return Some(found);
        }
    }
    None
}

fn for_each_node(nodes: &[CommentNode], f: &mut dyn FnMut(&CommentNode)) {
    fn walk(nodes: &[CommentNode], f: &mut dyn FnMut(&CommentNode), depth: usize) {
        if depth > MAX_WALK_DEPTH {
            return;
        }
        for node in nodes {
            f(node);
            walk(&node.children, f, depth + 1);
        }
    }
    walk(nodes, f, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: ItemId, kids: &[ItemId]) -> Item {
        Item {
            id,
            kind: crate::models::ItemKind::Comment,
            author: Some(format!("user{}", id)),
            created_at: 0,
            text: Some(format!("comment {}", id)),
            title: None,
            url: None,
            score: 0,
            descendants: None,
            child_ids: kids.to_vec(),
            parent: None,
            deleted: false,
            dead: false,
        }
    }

    fn loaded(id: ItemId, depth: usize, children: Vec<CommentNode>) -> CommentNode {
        let kids: Vec<ItemId> = children.iter().map(|c| c.id()).collect();
        let mut node = CommentNode::unloaded(item(id, &kids), depth);
        node.attach_children(children);
        node
    }

    fn sample_tree() -> Vec<CommentNode> {
        vec![
            loaded(1, 1, vec![loaded(2, 2, vec![]), CommentNode::unloaded(item(3, &[30, 31]), 2)]),
            loaded(4, 1, vec![]),
        ]
    }

    #[test]
    fn overlay_defaults_to_expanded() {
        let mut overlay = ExpansionOverlay::default();
        assert!(overlay.is_expanded(99));
        assert!(!overlay.is_loading(99));
        assert!(!overlay.toggle(99));
        assert!(overlay.toggle(99));
        overlay.set_loading(99, true);
        assert!(overlay.get(99).expanded);
        assert!(overlay.get(99).loading);
    }

    #[test]
    fn merge_into_nested_node() {
        let mut tree = sample_tree();
        let replies = vec![CommentNode::unloaded(item(30, &[]), 3)];

        assert!(merge_children_into_tree(&mut tree, 3, replies));
        let node = find_node(&tree, 3).unwrap();
        assert!(node.children_loaded);
        assert!(!node.has_unloaded_children);
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].id(), 30);
    }

    #[test]
    fn merge_with_unknown_target_leaves_tree_unchanged() {
        let mut tree = sample_tree();
        let before = tree.clone();

        let replies = vec![CommentNode::unloaded(item(77, &[]), 3)];
        assert!(!merge_children_into_tree(&mut tree, 12345, replies));
        assert_eq!(tree, before);
    }

    #[test]
    fn merge_stops_at_first_match_for_duplicate_ids() {
        let mut tree = vec![loaded(1, 1, vec![]), loaded(1, 1, vec![])];
        assert!(merge_children_into_tree(&mut tree, 1, vec![loaded(5, 2, vec![])]));
        assert_eq!(tree[0].children.len(), 1);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn descendants_count_only_loaded_nodes() {
        let tree = sample_tree();
        assert_eq!(count_descendants(&tree[0]), 2);
        assert_eq!(count_descendants(&tree[1]), 0);
    }

    #[test]
    fn begin_expand_is_single_flight() {
        let mut thread = CommentThread::new(CommentSettings::default());
        let ticket = thread.begin_load(1000);
        let loaded_story = LoadedStory {
            story: item(1000, &[1, 4]),
            nodes: sample_tree(),
        };
        assert!(thread.finish_load(&ticket, Ok(loaded_story)));

        let first = thread.begin_expand(3).unwrap();
        assert_eq!(first.child_ids, vec![30, 31]);
        assert_eq!(first.child_depth, 3);
        assert!(thread.overlay().is_loading(3));
        assert!(thread.begin_expand(3).is_none());

        thread.finish_expand(&first, vec![CommentNode::unloaded(item(30, &[]), 0)]);
        assert!(!thread.overlay().is_loading(3));
        assert!(!thread.is_in_flight(3));
        assert_eq!(thread.find(30).unwrap().depth, 3);

        // Loaded now, so there is nothing left to fetch.
        assert!(thread.begin_expand(3).is_none());
    }

    #[test]
    fn frontier_nodes_start_expanded_and_auto_fetch() {
        let mut thread = CommentThread::new(CommentSettings::default());
        let ticket = thread.begin_load(1000);
        thread.finish_load(
            &ticket,
            Ok(LoadedStory {
                story: item(1000, &[1, 4]),
                nodes: sample_tree(),
            }),
        );

        assert!(thread.overlay().is_expanded(1));
        assert!(thread.overlay().is_expanded(3));

        let ticket = thread.auto_expand(3).unwrap();
        assert_eq!(ticket.node_id, 3);
        assert!(thread.auto_expand(3).is_none());
        // Loaded nodes have nothing to fetch.
        assert!(thread.auto_expand(1).is_none());

        thread.finish_expand(&ticket, vec![]);
        assert!(thread.auto_expand(3).is_none());
    }

    #[test]
    fn collapsed_frontier_does_not_auto_fetch() {
        let mut thread = CommentThread::new(CommentSettings::default());
        let ticket = thread.begin_load(1000);
        thread.finish_load(
            &ticket,
            Ok(LoadedStory {
                story: item(1000, &[1, 4]),
                nodes: sample_tree(),
            }),
        );

        assert!(thread.toggle_expansion(3).is_none());
        assert!(!thread.overlay().is_expanded(3));
        assert!(thread.auto_expand(3).is_none());

        // Reopening it fetches.
        assert_eq!(thread.toggle_expansion(3).unwrap().node_id, 3);
    }

    #[test]
    fn toggle_respects_auto_fetch_depth() {
        let settings = CommentSettings {
            max_auto_fetch_depth: 2,
            ..CommentSettings::default()
        };
        let mut thread = CommentThread::new(settings);
        let ticket = thread.begin_load(1000);
        thread.finish_load(
            &ticket,
            Ok(LoadedStory {
                story: item(1000, &[1, 4]),
                nodes: sample_tree(),
            }),
        );

        assert!(thread.toggle_expansion(3).is_none());
        assert!(thread.toggle_expansion(3).is_none());
        assert!(thread.overlay().is_expanded(3));
        assert!(thread.auto_expand(3).is_none());
        // An explicit expansion is still allowed.
        assert!(thread.begin_expand(3).is_some());
    }

    #[test]
    fn stale_results_are_dropped() {
        let mut thread = CommentThread::new(CommentSettings::default());
        let old = thread.begin_load(1000);
        let expand_old = {
            thread.finish_load(
                &old,
                Ok(LoadedStory {
                    story: item(1000, &[1, 4]),
                    nodes: sample_tree(),
                }),
            );
            thread.begin_expand(3).unwrap()
        };

        let new = thread.begin_load(2000);
        assert!(!thread.is_in_flight(3));

        assert!(!thread.finish_expand(&expand_old, vec![]));
        assert!(!thread.finish_load(
            &old,
            Ok(LoadedStory {
                story: item(1000, &[1]),
                nodes: sample_tree(),
            })
        ));
        assert!(thread.nodes().is_empty());
        assert!(thread.is_loading());

        assert!(thread.finish_load(
            &new,
            Ok(LoadedStory {
                story: item(2000, &[]),
                nodes: vec![],
            })
        ));
        assert_eq!(thread.story().map(|s| s.id), Some(2000));
        assert!(!thread.is_loading());
    }

    #[test]
    fn failed_load_sets_error_and_clears_loading() {
        let mut thread = CommentThread::new(CommentSettings::default());
        let ticket = thread.begin_load(5);
        thread.finish_load(&ticket, Err(FetchError::Timeout));

        assert!(!thread.is_loading());
        assert!(thread.error().is_some());
        assert!(thread.nodes().is_empty());

        let retry = thread.retry().unwrap();
        assert_eq!(retry.story_id, 5);
        assert!(thread.error().is_none());
    }

    #[test]
    fn top_level_window_grows_in_steps() {
        let settings = CommentSettings {
            top_level_page: 2,
            ..CommentSettings::default()
        };
        let mut thread = CommentThread::new(settings);
        let ticket = thread.begin_load(1);
        let nodes: Vec<CommentNode> = (10..15).map(|id| loaded(id, 1, vec![])).collect();
        thread.finish_load(
            &ticket,
            Ok(LoadedStory {
                story: item(1, &[10, 11, 12, 13, 14]),
                nodes,
            }),
        );

        assert_eq!(thread.visible_nodes().len(), 2);
        thread.show_more_top_level();
        assert_eq!(thread.visible_nodes().len(), 4);
        thread.show_more_top_level();
        assert_eq!(thread.visible_nodes().len(), 5);
        assert!(!thread.has_more_top_level());
    }

    #[test]
    fn set_all_expanded_covers_every_loaded_node() {
        let mut thread = CommentThread::new(CommentSettings::default());
        let ticket = thread.begin_load(1000);
        thread.finish_load(
            &ticket,
            Ok(LoadedStory {
                story: item(1000, &[1, 4]),
                nodes: sample_tree(),
            }),
        );

        thread.set_all_expanded(false);
        for id in [1, 2, 3, 4] {
            assert!(!thread.overlay().is_expanded(id));
        }
        thread.set_all_expanded(true);
        assert!(thread.overlay().is_expanded(3));
        assert!(!thread.is_in_flight(3));
    }
}
