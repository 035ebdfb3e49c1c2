use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::db::InteractionStore;
use crate::error::FetchError;
use crate::feed::{fetch_items, project_read, project_starred, refresh_flags, remove_entry};
use crate::hn_client::ItemSource;
use crate::interactions::Interactions;
use crate::models::{FeedEntry, Generation, Item, ItemId, User};

#[derive(Debug, Clone)]
pub struct ProfileTicket {
    pub generation: Generation,
    pub handle: String,
    pub hidden: HashSet<ItemId>,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct ProfileData {
    pub user: User,
    pub stories: Vec<Item>,
}

/// A user's record plus their most recent submitted stories.
pub struct UserProfile {
    limit: usize,
    generation: Generation,
    handle: Option<String>,
    user: Option<User>,
    entries: Vec<FeedEntry>,
    loading: bool,
    error: Option<String>,
}

impl UserProfile {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            generation: Generation::default(),
            handle: None,
            user: None,
            entries: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn begin_load<S: InteractionStore>(&mut self, handle: &str, interactions: &Interactions<S>) -> ProfileTicket {
        self.generation = self.generation.next();
        self.handle = Some(handle.to_string());
        self.user = None;
        self.entries.clear();
        self.loading = true;
        self.error = None;

        ProfileTicket {
            generation: self.generation,
            handle: handle.to_string(),
            hidden: interactions.hidden_ids().clone(),
            limit: self.limit,
        }
    }

    pub fn finish_load<S: InteractionStore>(
        &mut self,
        ticket: &ProfileTicket,
        result: Result<ProfileData, FetchError>,
        interactions: &Interactions<S>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(user = %ticket.handle, "dropping abandoned profile");
            return false;
        }
        self.loading = false;

        match result {
            Ok(data) => {
                info!(user = %ticket.handle, stories = data.stories.len(), "loaded profile");
                self.entries = data
                    .stories
                    .into_iter()
                    .filter(|story| !interactions.is_hidden(story.id))
                    .map(|story| interactions.annotate(story))
                    .collect();
                self.user = Some(data.user);
            }
            Err(FetchError::Cancelled) => {}
            Err(e) => {
                warn!(user = %ticket.handle, "failed to load profile: {}", e);
                self.error = Some(e.user_message());
            }
        }
        true
    }

    pub fn retry<S: InteractionStore>(&mut self, interactions: &Interactions<S>) -> Option<ProfileTicket> {
        self.error.as_ref()?;
        let handle = self.handle.clone()?;
        Some(self.begin_load(&handle, interactions))
    }

    pub fn mark_read<S: InteractionStore>(&mut self, interactions: &mut Interactions<S>, id: ItemId) -> Result<()> {
        interactions.mark_read(id)?;
        project_read(&mut self.entries, id);
        Ok(())
    }

    pub fn toggle_star<S: InteractionStore>(
        &mut self,
        interactions: &mut Interactions<S>,
        id: ItemId,
    ) -> Result<bool> {
        let starred = interactions.toggle_star(id)?;
        project_starred(&mut self.entries, id, starred);
        Ok(starred)
    }

    pub fn hide_item<S: InteractionStore>(&mut self, interactions: &mut Interactions<S>, id: ItemId) -> Result<()> {
        interactions.hide(id)?;
        remove_entry(&mut self.entries, id);
        Ok(())
    }

    pub fn sync_flags<S: InteractionStore>(&mut self, interactions: &Interactions<S>) {
        self.entries.retain(|entry| !interactions.is_hidden(entry.item.id));
        refresh_flags(&mut self.entries, interactions);
    }

    pub async fn load<S: InteractionStore>(
        &mut self,
        source: &dyn ItemSource,
        handle: &str,
        interactions: &Interactions<S>,
    ) -> bool {
        let ticket = self.begin_load(handle, interactions);
        let result = fetch_profile(source, &ticket).await;
        self.finish_load(&ticket, result, interactions);
        self.error.is_none()
    }
}

/// Fetches the user and their first `limit` submissions, keeping visible
/// stories only.
pub async fn fetch_profile(source: &dyn ItemSource, ticket: &ProfileTicket) -> Result<ProfileData, FetchError> {
    let user = source
        .fetch_user(&ticket.handle)
        .await?
        .ok_or_else(|| FetchError::NotFound(format!("user {}", ticket.handle)))?;

    let submitted: Vec<ItemId> = user.submitted.iter().copied().take(ticket.limit).collect();
    let (items, _) = fetch_items(source, &submitted).await;

    let stories = items
        .into_iter()
        .filter(|item| item.is_story() && !ticket.hidden.contains(&item.id))
        .collect();

    Ok(ProfileData { user, stories })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn user(handle: &str) -> User {
        User {
            id: handle.to_string(),
            created: 0,
            karma: 10,
            about: None,
            submitted: vec![1, 2],
        }
    }

    fn story(id: ItemId) -> Item {
        serde_json::from_str(&format!(r#"{{"id":{},"type":"story","title":"s","by":"pg"}}"#, id)).unwrap()
    }

    #[test]
    fn not_found_message() {
        let interactions = Interactions::load(MemoryStore::new());
        let mut profile = UserProfile::new(30);
        let ticket = profile.begin_load("ghost", &interactions);
        profile.finish_load(&ticket, Err(FetchError::NotFound("user ghost".into())), &interactions);

        assert_eq!(profile.error(), Some("User ghost not found"));
        assert!(!profile.is_loading());
        assert!(profile.retry(&interactions).is_some());
    }

    #[test]
    fn entries_are_annotated_and_filtered() {
        let mut interactions = Interactions::load(MemoryStore::new());
        interactions.toggle_star(1).unwrap();
        let mut profile = UserProfile::new(30);
        let ticket = profile.begin_load("pg", &interactions);
        interactions.hide(2).unwrap();

        profile.finish_load(
            &ticket,
            Ok(ProfileData {
                user: user("pg"),
                stories: vec![story(1), story(2)],
            }),
            &interactions,
        );

        assert_eq!(profile.entries().len(), 1);
        assert!(profile.entries()[0].is_starred);
        assert_eq!(profile.user().map(|u| u.karma), Some(10));

        profile.hide_item(&mut interactions, 1).unwrap();
        assert!(profile.entries().is_empty());
    }

    #[test]
    fn stale_profile_is_dropped() {
        let interactions = Interactions::load(MemoryStore::new());
        let mut profile = UserProfile::new(30);
        let old = profile.begin_load("a", &interactions);
        let _new = profile.begin_load("b", &interactions);

        let data = ProfileData {
            user: user("a"),
            stories: vec![],
        };
        assert!(!profile.finish_load(&old, Ok(data), &interactions));
        assert!(profile.is_loading());
        assert_eq!(profile.handle(), Some("b"));
    }
}
