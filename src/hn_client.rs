use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::config::ReaderConfig;
use crate::error::FetchError;
use crate::models::{FeedIdCache, FeedKind, Item, ItemId, User};

/// Read-only access to the remote item tree.
///
/// Every call may fail or stall; callers decide whether a failure drops a
/// branch or surfaces to the user.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// `Ok(None)` when the ID does not resolve to a record.
    async fn fetch_item(&self, id: ItemId) -> Result<Option<Item>, FetchError>;

    /// The full upstream ranking for `kind`. Local feeds yield an empty list.
    async fn fetch_feed_ids(&self, kind: FeedKind) -> Result<Vec<ItemId>, FetchError>;

    async fn fetch_user(&self, handle: &str) -> Result<Option<User>, FetchError>;

    /// Drops any cached ID lists so the next request goes upstream.
    fn invalidate(&self) {}
}

pub struct HackerNewsClient {
    client: Client,
    base_url: String,
    pub(crate) cache: Arc<Mutex<FeedIdCache>>,
    pub(crate) cache_ttl_secs: u64,
}

impl HackerNewsClient {
    pub fn new(config: &ReaderConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("hn_reader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            cache: Arc::new(Mutex::new(FeedIdCache::new())),
            cache_ttl_secs: config.cache_ttl_secs,
        })
    }

    /// Forces the next ID-list request of every feed to hit the network.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// GETs `<base>/<path>.json`. The API answers `null` for unknown IDs.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, FetchError> {
        let url = format!("{}/{}.json", self.base_url, path);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let value = response.json::<Option<T>>().await?;
        Ok(value)
    }
}

#[async_trait]
impl ItemSource for HackerNewsClient {
    async fn fetch_item(&self, id: ItemId) -> Result<Option<Item>, FetchError> {
        self.get_json(&format!("item/{}", id)).await
    }

    async fn fetch_feed_ids(&self, kind: FeedKind) -> Result<Vec<ItemId>, FetchError> {
        let Some(endpoint) = kind.endpoint() else {
            return Ok(Vec::new());
        };

        // Don't block on the cache if another task holds it
        if let Ok(cache) = self.cache.try_lock() {
            if cache.is_valid(kind, self.cache_ttl_secs) {
                if let Some(ids) = cache.get(kind) {
                    return Ok(ids.clone());
                }
            }
        }

        let ids: Vec<ItemId> = self.get_json(endpoint).await?.unwrap_or_default();

        if let Ok(mut cache) = self.cache.try_lock() {
            cache.update(kind, ids.clone());
            debug!(feed = kind.label(), count = ids.len(), "updated feed id cache");
        }

        Ok(ids)
    }

    async fn fetch_user(&self, handle: &str) -> Result<Option<User>, FetchError> {
        self.get_json(&format!("user/{}", urlencoding::encode(handle))).await
    }

    fn invalidate(&self) {
        self.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_feeds_never_touch_the_network() {
        let config = ReaderConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..ReaderConfig::default()
        };
        let client = HackerNewsClient::new(&config).unwrap();
        let ids = client.fetch_feed_ids(FeedKind::Starred).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn cached_ids_are_served_without_a_request() {
        let config = ReaderConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..ReaderConfig::default()
        };
        let client = HackerNewsClient::new(&config).unwrap();
        client.cache.lock().unwrap().update(FeedKind::Top, vec![3, 2, 1]);

        let ids = client.fetch_feed_ids(FeedKind::Top).await.unwrap();
        assert_eq!(ids, vec![3, 2, 1]);

        client.clear_cache();
        assert!(client.cache.lock().unwrap().get(FeedKind::Top).is_none());
    }
}
