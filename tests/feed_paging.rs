mod common;

use std::collections::HashSet;

use common::{story_feed, MockSource};
use hn_reader::config::FeedSettings;
use hn_reader::db::{Database, MemoryStore};
use hn_reader::feed::{fetch_page, Feed, FeedTicket};
use hn_reader::interactions::Interactions;
use hn_reader::models::{FeedKind, ItemId, User};
use hn_reader::profile::UserProfile;

fn entry_ids(feed: &Feed) -> Vec<ItemId> {
    feed.entries().iter().map(|e| e.item.id).collect()
}

fn assert_unique(feed: &Feed) {
    let ids = entry_ids(feed);
    let unique: HashSet<ItemId> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len(), "duplicate entries: {:?}", ids);
}

#[tokio::test]
async fn two_pages_of_a_hundred_ids() {
    let source = story_feed(FeedKind::Top, 100);
    let interactions = Interactions::load(MemoryStore::new());
    let mut feed = Feed::new(FeedKind::Top, FeedSettings::default());

    assert!(feed.init_feed(&source, FeedKind::Top, &interactions).await);
    assert_eq!(feed.all_ids().len(), 100);

    assert!(feed.fetch_next_page(&source, &interactions).await);
    assert!(feed.fetch_next_page(&source, &interactions).await);

    assert_eq!(feed.entries().len(), 60);
    assert_eq!(entry_ids(&feed), (1..=60).collect::<Vec<_>>());
    assert!(!feed.is_exhausted());
    assert!(feed.has_more());
}

#[tokio::test]
async fn exhausted_once_upstream_runs_dry() {
    let source = story_feed(FeedKind::Top, 100);
    let interactions = Interactions::load(MemoryStore::new());
    let mut feed = Feed::new(FeedKind::Top, FeedSettings::default());
    feed.init_feed(&source, FeedKind::Top, &interactions).await;

    while feed.fetch_next_page(&source, &interactions).await {}

    assert_eq!(feed.entries().len(), 100);
    assert!(feed.is_exhausted());
    assert!(!feed.fetch_next_page(&source, &interactions).await);
    assert_unique(&feed);
}

#[tokio::test]
async fn top_up_extends_past_the_first_batch() {
    let source = story_feed(FeedKind::New, 250);
    let interactions = Interactions::load(MemoryStore::new());
    let mut feed = Feed::new(FeedKind::New, FeedSettings::default());
    feed.init_feed(&source, FeedKind::New, &interactions).await;
    assert_eq!(feed.all_ids().len(), 100);

    for _ in 0..4 {
        feed.fetch_next_page(&source, &interactions).await;
    }

    assert_eq!(feed.entries().len(), 120);
    assert_eq!(feed.all_ids().len(), 200);
    assert!(!feed.is_exhausted());
    assert_unique(&feed);

    while feed.fetch_next_page(&source, &interactions).await {}
    assert_eq!(feed.entries().len(), 250);
    assert_eq!(entry_ids(&feed), (1..=250).collect::<Vec<_>>());
}

#[tokio::test]
async fn failed_top_up_is_retryable_not_the_end() {
    let source = story_feed(FeedKind::Top, 250).feed_fails_after(1);
    let interactions = Interactions::load(MemoryStore::new());
    let mut feed = Feed::new(FeedKind::Top, FeedSettings::default());
    feed.init_feed(&source, FeedKind::Top, &interactions).await;

    while feed.fetch_next_page(&source, &interactions).await {}

    assert_eq!(feed.entries().len(), 100);
    assert!(!feed.is_exhausted());
    assert!(feed.error().is_some());

    source.restore_feed();
    let Some(FeedTicket::Page(ticket)) = feed.retry(&interactions) else {
        panic!("expected a page retry");
    };
    let page = fetch_page(&source, &ticket).await;
    assert!(feed.finish_page(&ticket, page, &interactions));
    assert!(feed.error().is_none());

    while feed.fetch_next_page(&source, &interactions).await {}
    assert_eq!(entry_ids(&feed), (1..=250).collect::<Vec<_>>());
    assert!(feed.is_exhausted());
}

#[tokio::test]
async fn failed_refresh_keeps_the_list_on_screen() {
    let source = story_feed(FeedKind::Top, 100).feed_fails_after(1);
    let interactions = Interactions::load(MemoryStore::new());
    let mut feed = Feed::new(FeedKind::Top, FeedSettings::default());
    assert!(feed.init_feed(&source, FeedKind::Top, &interactions).await);
    feed.fetch_next_page(&source, &interactions).await;
    assert_eq!(feed.entries().len(), 30);

    assert!(!feed.init_feed(&source, FeedKind::Top, &interactions).await);

    assert_eq!(entry_ids(&feed), (1..=30).collect::<Vec<_>>());
    assert_eq!(feed.all_ids().len(), 100);
    assert!(feed.error().is_some());
    assert!(!feed.is_loading());
}

#[tokio::test]
async fn hidden_story_never_resurfaces() {
    let source = story_feed(FeedKind::Top, 100);
    let mut interactions = Interactions::load(MemoryStore::new());
    let mut feed = Feed::new(FeedKind::Top, FeedSettings::default());
    feed.init_feed(&source, FeedKind::Top, &interactions).await;
    feed.fetch_next_page(&source, &interactions).await;

    feed.hide_item(&mut interactions, 5).unwrap();
    assert!(!entry_ids(&feed).contains(&5));
    assert!(feed.all_ids().contains(&5));

    while feed.fetch_next_page(&source, &interactions).await {}
    assert!(!entry_ids(&feed).contains(&5));
    assert_eq!(feed.entries().len(), 99);
    assert_unique(&feed);
}

#[tokio::test]
async fn starred_feed_reads_local_set_only() {
    let source = story_feed(FeedKind::Top, 10);
    let mut interactions = Interactions::load(MemoryStore::new());
    for id in [3, 7, 9] {
        interactions.toggle_star(id).unwrap();
    }

    let mut feed = Feed::new(FeedKind::Starred, FeedSettings::default());
    feed.init_feed(&source, FeedKind::Starred, &interactions).await;
    feed.fetch_next_page(&source, &interactions).await;

    assert_eq!(source.feed_fetches(), 0);
    assert_eq!(entry_ids(&feed), vec![3, 7, 9]);
    assert!(feed.is_exhausted());

    assert!(!feed.toggle_star(&mut interactions, 7).unwrap());
    assert_eq!(entry_ids(&feed), vec![3, 9]);
}

#[tokio::test]
async fn failed_items_are_skipped_but_an_all_failed_page_is_an_error() {
    let source = story_feed(FeedKind::Best, 40).failing(2);
    let interactions = Interactions::load(MemoryStore::new());
    let mut feed = Feed::new(FeedKind::Best, FeedSettings::default());
    feed.init_feed(&source, FeedKind::Best, &interactions).await;
    feed.fetch_next_page(&source, &interactions).await;
    assert_eq!(feed.entries().len(), 29);
    assert!(feed.error().is_none());

    let broken = MockSource::new().with_feed(FeedKind::Best, vec![1, 2]).failing(1).failing(2);
    let mut feed = Feed::new(FeedKind::Best, FeedSettings::default());
    feed.init_feed(&broken, FeedKind::Best, &interactions).await;
    feed.fetch_next_page(&broken, &interactions).await;

    assert!(feed.error().is_some());
    assert!(feed.entries().is_empty());
    assert!(!feed.is_loading());
    assert!(!feed.is_exhausted());
}

#[tokio::test]
async fn interactions_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let source = story_feed(FeedKind::Top, 30);
    {
        let mut interactions = Interactions::load(Database::open_in_dir(dir.path()).unwrap());
        let mut feed = Feed::new(FeedKind::Top, FeedSettings::default());
        feed.init_feed(&source, FeedKind::Top, &interactions).await;
        feed.fetch_next_page(&source, &interactions).await;
        feed.mark_read(&mut interactions, 1).unwrap();
        feed.toggle_star(&mut interactions, 2).unwrap();
        feed.hide_item(&mut interactions, 3).unwrap();
    }

    let interactions = Interactions::load(Database::open_in_dir(dir.path()).unwrap());
    let mut feed = Feed::new(FeedKind::Top, FeedSettings::default());
    feed.init_feed(&source, FeedKind::Top, &interactions).await;
    feed.fetch_next_page(&source, &interactions).await;

    assert_eq!(feed.entries().len(), 29);
    assert!(feed.entries()[0].is_read);
    assert!(feed.entries()[1].is_starred);
    assert!(!entry_ids(&feed).contains(&3));
}

#[tokio::test]
async fn profile_lists_visible_stories() {
    let source = story_feed(FeedKind::Top, 5)
        .with_comment(6, &[])
        .with_user(User {
            id: "pg".to_string(),
            created: 1_160_418_092,
            karma: 155_000,
            about: None,
            submitted: vec![6, 1, 2, 3],
        });
    let mut interactions = Interactions::load(MemoryStore::new());
    interactions.hide(2).unwrap();
    interactions.toggle_star(3).unwrap();

    let mut profile = UserProfile::new(30);
    assert!(profile.load(&source, "pg", &interactions).await);

    let ids: Vec<ItemId> = profile.entries().iter().map(|e| e.item.id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert!(profile.entries()[1].is_starred);

    assert!(!profile.load(&source, "nobody", &interactions).await);
    assert_eq!(profile.error(), Some("User nobody not found"));
}
