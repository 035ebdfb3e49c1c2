use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Identifier assigned by the remote source to every story, comment and job.
pub type ItemId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Story,
    Comment,
    Job,
    Poll,
    PollOpt,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A story or comment record as returned by the item endpoint.
///
/// Records are snapshots: `child_ids` is whatever the source reported at fetch
/// time and is never refreshed in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    #[serde(rename = "by")]
    pub author: Option<String>,
    #[serde(rename = "time", default)]
    pub created_at: i64,
    pub text: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub score: i64,
    pub descendants: Option<u32>,
    #[serde(rename = "kids", default)]
    pub child_ids: Vec<ItemId>,
    pub parent: Option<ItemId>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

impl Item {
    /// Deleted, dead, or carrying neither text nor author.
    pub fn is_tombstone(&self) -> bool {
        let no_text = self.text.as_deref().map_or(true, str::is_empty);
        self.deleted || self.dead || (no_text && self.author.is_none())
    }

    pub fn is_story(&self) -> bool {
        self.title.is_some()
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn author(&self) -> &str {
        self.author.as_deref().unwrap_or("[unknown]")
    }

    /// Host of the story link without a leading `www.`.
    pub fn domain(&self) -> Option<String> {
        let parsed = url::Url::parse(self.url.as_deref()?).ok()?;
        let host = parsed.host_str()?;
        Some(host.strip_prefix("www.").unwrap_or(host).to_string())
    }

    /// Remote-reported reply total, preferred over counting loaded nodes.
    pub fn comment_count(&self) -> u32 {
        self.descendants.unwrap_or(0)
    }

    pub fn created(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.created_at, 0)
            .single()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub karma: i64,
    pub about: Option<String>,
    #[serde(default)]
    pub submitted: Vec<ItemId>,
}

/// A materialised comment plus whatever part of its subtree has been fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub item: Item,
    /// Top-level comments sit at depth 1.
    pub depth: usize,
    pub children: Vec<CommentNode>,
    pub children_loaded: bool,
    /// The source lists children that have not been fetched yet.
    pub has_unloaded_children: bool,
}

impl CommentNode {
    /// Wraps a freshly fetched record whose children are not fetched yet.
    pub fn unloaded(item: Item, depth: usize) -> Self {
        let has_children = !item.child_ids.is_empty();
        Self {
            item,
            depth,
            children: Vec::new(),
            children_loaded: !has_children,
            has_unloaded_children: has_children,
        }
    }

    pub fn id(&self) -> ItemId {
        self.item.id
    }

    pub fn attach_children(&mut self, children: Vec<CommentNode>) {
        self.children = children;
        self.children_loaded = true;
        self.has_unloaded_children = false;
    }

    /// Visual indent level, capped independently of the logical depth.
    pub fn indent(&self, max_indent: usize) -> usize {
        self.depth.saturating_sub(1).min(max_indent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Top,
    New,
    Best,
    Ask,
    Show,
    Jobs,
    Starred,
}

impl FeedKind {
    pub const ALL: [FeedKind; 7] = [
        FeedKind::Top,
        FeedKind::New,
        FeedKind::Best,
        FeedKind::Ask,
        FeedKind::Show,
        FeedKind::Jobs,
        FeedKind::Starred,
    ];

    /// Path of the upstream ID list, `None` for feeds built from local state.
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            FeedKind::Top => Some("topstories"),
            FeedKind::New => Some("newstories"),
            FeedKind::Best => Some("beststories"),
            FeedKind::Ask => Some("askstories"),
            FeedKind::Show => Some("showstories"),
            FeedKind::Jobs => Some("jobstories"),
            FeedKind::Starred => None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.endpoint().is_none()
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeedKind::Top => "Top",
            FeedKind::New => "New",
            FeedKind::Best => "Best",
            FeedKind::Ask => "Ask",
            FeedKind::Show => "Show",
            FeedKind::Jobs => "Jobs",
            FeedKind::Starred => "Starred",
        }
    }
}

/// An item as displayed in a listing, with its interaction flags copied in at
/// the time it was added. The interaction sets stay authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub item: Item,
    pub is_read: bool,
    pub is_starred: bool,
}

/// Token identifying one view context (a story, a feed tab, a profile).
/// Results carrying an older generation are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

/// Upstream ID lists keyed by feed, reused until they age out.
pub struct FeedIdCache {
    lists: HashMap<FeedKind, (Vec<ItemId>, Instant)>,
}

impl FeedIdCache {
    pub fn new() -> Self {
        Self {
            lists: HashMap::new(),
        }
    }

    pub fn is_valid(&self, kind: FeedKind, ttl_secs: u64) -> bool {
        match self.lists.get(&kind) {
            Some((ids, fetched_at)) => !ids.is_empty() && fetched_at.elapsed().as_secs() < ttl_secs,
            None => false,
        }
    }

    pub fn get(&self, kind: FeedKind) -> Option<&Vec<ItemId>> {
        self.lists.get(&kind).map(|(ids, _)| ids)
    }

    pub fn update(&mut self, kind: FeedKind, ids: Vec<ItemId>) {
        self.lists.insert(kind, (ids, Instant::now()));
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }
}

impl Default for FeedIdCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Short relative age: `42m`, `5h`, `3d`, `4mo`, then a calendar date.
pub fn time_ago(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created);
    let minutes = elapsed.num_minutes().max(0);
    let hours = elapsed.num_hours().max(0);

    if hours < 1 {
        return format!("{}m", minutes);
    }
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    let months = days / 30;
    if months < 12 {
        return format!("{}mo", months);
    }

    created.format("%b %-d, %Y").to_string()
}
