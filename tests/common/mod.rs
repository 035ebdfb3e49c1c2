#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use hn_reader::error::FetchError;
use hn_reader::hn_client::ItemSource;
use hn_reader::models::{FeedKind, Item, ItemId, ItemKind, User};

/// In-memory item source that counts every request.
#[derive(Default)]
pub struct MockSource {
    items: HashMap<ItemId, Item>,
    feeds: HashMap<FeedKind, Vec<ItemId>>,
    users: HashMap<String, User>,
    failing: HashSet<ItemId>,
    hanging: HashSet<ItemId>,
    item_fetches: Mutex<HashMap<ItemId, usize>>,
    feed_fetches: Mutex<usize>,
    /// Feed-ID calls past this many time out.
    feed_limit: Mutex<Option<usize>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_story(mut self, id: ItemId, kids: &[ItemId]) -> Self {
        self.items.insert(id, story(id, kids));
        self
    }

    pub fn with_comment(mut self, id: ItemId, kids: &[ItemId]) -> Self {
        self.items.insert(id, comment(id, kids));
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.insert(item.id, item);
        self
    }

    pub fn with_feed(mut self, kind: FeedKind, ids: Vec<ItemId>) -> Self {
        self.feeds.insert(kind, ids);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn failing(mut self, id: ItemId) -> Self {
        self.failing.insert(id);
        self
    }

    /// Every feed-ID call after the first `calls` times out.
    pub fn feed_fails_after(self, calls: usize) -> Self {
        *self.feed_limit.lock().unwrap() = Some(calls);
        self
    }

    pub fn restore_feed(&self) {
        *self.feed_limit.lock().unwrap() = None;
    }

    /// Requests for `id` never complete.
    pub fn hanging(mut self, id: ItemId) -> Self {
        self.hanging.insert(id);
        self
    }

    pub fn fetches_of(&self, id: ItemId) -> usize {
        self.item_fetches.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    pub fn total_item_fetches(&self) -> usize {
        self.item_fetches.lock().unwrap().values().sum()
    }

    pub fn feed_fetches(&self) -> usize {
        *self.feed_fetches.lock().unwrap()
    }
}

#[async_trait]
impl ItemSource for MockSource {
    async fn fetch_item(&self, id: ItemId) -> Result<Option<Item>, FetchError> {
        *self.item_fetches.lock().unwrap().entry(id).or_default() += 1;

        if self.hanging.contains(&id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&id) {
            return Err(FetchError::Network("connection reset".to_string()));
        }
        tokio::task::yield_now().await;
        Ok(self.items.get(&id).cloned())
    }

    async fn fetch_feed_ids(&self, kind: FeedKind) -> Result<Vec<ItemId>, FetchError> {
        let calls = {
            let mut fetches = self.feed_fetches.lock().unwrap();
            *fetches += 1;
            *fetches
        };
        if self.feed_limit.lock().unwrap().is_some_and(|limit| calls > limit) {
            return Err(FetchError::Timeout);
        }
        Ok(self.feeds.get(&kind).cloned().unwrap_or_default())
    }

    async fn fetch_user(&self, handle: &str) -> Result<Option<User>, FetchError> {
        Ok(self.users.get(handle).cloned())
    }
}

pub fn story(id: ItemId, kids: &[ItemId]) -> Item {
    Item {
        id,
        kind: ItemKind::Story,
        author: Some("pg".to_string()),
        created_at: 1_700_000_000,
        text: None,
        title: Some(format!("Story {}", id)),
        url: Some(format!("https://example.com/{}", id)),
        score: 100,
        descendants: Some(kids.len() as u32),
        child_ids: kids.to_vec(),
        parent: None,
        deleted: false,
        dead: false,
    }
}

pub fn comment(id: ItemId, kids: &[ItemId]) -> Item {
    Item {
        id,
        kind: ItemKind::Comment,
        author: Some(format!("user{}", id)),
        created_at: 1_700_000_000,
        text: Some(format!("Comment {}", id)),
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

pub fn deleted_comment(id: ItemId) -> Item {
    Item {
        deleted: true,
        author: None,
        text: None,
        ..comment(id, &[])
    }
}

/// A feed of `count` stories with IDs `1..=count`.
pub fn story_feed(kind: FeedKind, count: u64) -> MockSource {
    let mut source = MockSource::new().with_feed(kind, (1..=count).collect());
    for id in 1..=count {
        source = source.with_story(id, &[]);
    }
    source
}
