use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";

/// Knobs for the comment tree engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommentSettings {
    /// Levels fetched eagerly when a story is opened.
    pub eager_depth: usize,
    /// Top-level comments fetched on open.
    pub top_level_fanout: usize,
    /// Per-comment fetch timeout in milliseconds.
    pub child_timeout_ms: u64,
    /// Expanding a node deeper than this does not fetch its replies.
    pub max_auto_fetch_depth: usize,
    pub max_indent: usize,
    /// Top-level comments revealed per "show more" step.
    pub top_level_page: usize,
}

impl CommentSettings {
    pub fn child_timeout(&self) -> Duration {
        Duration::from_millis(self.child_timeout_ms)
    }
}

impl Default for CommentSettings {
    fn default() -> Self {
        Self {
            eager_depth: 2,
            top_level_fanout: 50,
            child_timeout_ms: 5000,
            max_auto_fetch_depth: 10,
            max_indent: 5,
            top_level_page: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub page_size: usize,
    /// Upstream IDs requested per batch.
    pub id_batch: usize,
    /// Submissions fetched for a user profile.
    pub profile_limit: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: 30,
            id_batch: 100,
            profile_limit: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub data_dir: PathBuf,
    pub comments: CommentSettings,
    pub feed: FeedSettings,
}

impl ReaderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `~/.hn_reader`
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs_next::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home_dir.join(".hn_reader"))
    }

    /// Reads `config.json` from `dir` if present; any field it leaves out keeps
    /// its default.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("config.json");
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<ReaderConfig>(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            ReaderConfig::default()
        };

        if config.data_dir.as_os_str().is_empty() {
            config.data_dir = dir.to_path_buf();
        }
        Ok(config)
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            api_base: HN_API_BASE.to_string(),
            request_timeout_secs: 15,
            cache_ttl_secs: 300, // 5 minutes
            data_dir: PathBuf::new(),
            comments: CommentSettings::default(),
            feed: FeedSettings::default(),
        }
    }
}
