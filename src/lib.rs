//! Core of a Hacker News reader: a lazily grown comment tree, an
//! infinite-scroll feed paginator and the per-user read/starred/hidden sets.
//!
//! The view layer lives in the binary; everything here is usable headless.

pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod hn_client;
pub mod ids;
pub mod interactions;
pub mod loader;
pub mod models;
pub mod profile;
pub mod sanitize;

pub use comments::{CommentThread, ExpansionOverlay};
pub use config::ReaderConfig;
pub use db::{Database, InteractionStore};
pub use error::FetchError;
pub use feed::Feed;
pub use hn_client::{HackerNewsClient, ItemSource};
pub use interactions::Interactions;
pub use loader::{LoadEvent, Loader};
pub use models::{CommentNode, FeedEntry, FeedKind, Item, ItemId};
pub use profile::UserProfile;
