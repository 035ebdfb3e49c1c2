//! Runs the async halves of the engines off the UI thread.
//!
//! Results come back over a channel the UI polls each frame. Each view
//! context keeps the abort handles of its tasks, so switching story, feed or
//! profile stops the old requests. Anything that still lands afterwards is
//! rejected by the engine's generation check.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::comments::{fetch_replies, fetch_story_comments, ExpandTicket, LoadedStory, StoryTicket};
use crate::config::ReaderConfig;
use crate::error::FetchError;
use crate::feed::{fetch_initial_ids, fetch_page, FeedTicket, InitTicket, PageBatch, PageTicket};
use crate::hn_client::ItemSource;
use crate::models::{CommentNode, ItemId};
use crate::profile::{fetch_profile, ProfileData, ProfileTicket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadContext {
    Story,
    Feed,
    Profile,
}

pub enum LoadEvent {
    Story {
        ticket: StoryTicket,
        result: Result<LoadedStory, FetchError>,
    },
    Replies {
        ticket: ExpandTicket,
        children: Vec<CommentNode>,
    },
    FeedIds {
        ticket: InitTicket,
        result: Result<Vec<ItemId>, FetchError>,
    },
    FeedPage {
        ticket: PageTicket,
        result: Result<PageBatch, FetchError>,
    },
    Profile {
        ticket: ProfileTicket,
        result: Result<ProfileData, FetchError>,
    },
}

pub type Notify = Arc<dyn Fn() + Send + Sync>;

pub struct Loader {
    runtime: Runtime,
    source: Arc<dyn ItemSource>,
    config: ReaderConfig,
    sender: Sender<LoadEvent>,
    receiver: Receiver<LoadEvent>,
    tasks: HashMap<LoadContext, Vec<AbortHandle>>,
    notify: Option<Notify>,
}

impl Loader {
    pub fn new(source: Arc<dyn ItemSource>, config: ReaderConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("hn-loader")
            .enable_all()
            .build()
            .context("Failed to start the loader runtime")?;
        let (sender, receiver) = channel();

        Ok(Self {
            runtime,
            source,
            config,
            sender,
            receiver,
            tasks: HashMap::new(),
            notify: None,
        })
    }

    /// Called from a worker every time an event is queued, e.g. to request a
    /// repaint.
    pub fn set_notify(&mut self, notify: Notify) {
        self.notify = Some(notify);
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn ItemSource> {
        &self.source
    }

    /// Starts a story load, aborting everything else running for the
    /// previous story.
    pub fn load_story(&mut self, ticket: StoryTicket) {
        self.cancel(LoadContext::Story);
        let source = self.source.clone();
        let settings = self.config.comments.clone();
        self.spawn(LoadContext::Story, async move {
            let result = fetch_story_comments(source.as_ref(), ticket.story_id, &settings).await;
            LoadEvent::Story { ticket, result }
        });
    }

    pub fn expand(&mut self, ticket: ExpandTicket) {
        let source = self.source.clone();
        let timeout = self.config.comments.child_timeout();
        self.spawn(LoadContext::Story, async move {
            let children = fetch_replies(source.as_ref(), &ticket.child_ids, ticket.child_depth, timeout).await;
            LoadEvent::Replies { ticket, children }
        });
    }

    pub fn init_feed(&mut self, ticket: InitTicket) {
        self.cancel(LoadContext::Feed);
        let source = self.source.clone();
        self.spawn(LoadContext::Feed, async move {
            let result = fetch_initial_ids(source.as_ref(), &ticket).await;
            LoadEvent::FeedIds { ticket, result }
        });
    }

    pub fn fetch_page(&mut self, ticket: PageTicket) {
        let source = self.source.clone();
        self.spawn(LoadContext::Feed, async move {
            let result = fetch_page(source.as_ref(), &ticket).await;
            LoadEvent::FeedPage { ticket, result }
        });
    }

    pub fn feed_request(&mut self, ticket: FeedTicket) {
        match ticket {
            FeedTicket::Init(ticket) => self.init_feed(ticket),
            FeedTicket::Page(ticket) => self.fetch_page(ticket),
        }
    }

    pub fn load_profile(&mut self, ticket: ProfileTicket) {
        self.cancel(LoadContext::Profile);
        let source = self.source.clone();
        self.spawn(LoadContext::Profile, async move {
            let result = fetch_profile(source.as_ref(), &ticket).await;
            LoadEvent::Profile { ticket, result }
        });
    }

    /// Aborts every task started for `context`.
    pub fn cancel(&mut self, context: LoadContext) {
        if let Some(handles) = self.tasks.remove(&context) {
            let running = handles.iter().filter(|h| !h.is_finished()).count();
            if running > 0 {
                debug!(?context, running, "aborting in-flight requests");
            }
            for handle in handles {
                handle.abort();
            }
        }
    }

    /// Forgets cached upstream ID lists.
    pub fn invalidate(&self) {
        self.source.invalidate();
    }

    pub fn try_recv(&self) -> Option<LoadEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoadEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    fn spawn<F>(&mut self, context: LoadContext, task: F)
    where
        F: Future<Output = LoadEvent> + Send + 'static,
    {
        let sender = self.sender.clone();
        let notify = self.notify.clone();

        let handle = self.runtime.spawn(async move {
            let event = task.await;
            if sender.send(event).is_ok() {
                if let Some(notify) = notify {
                    notify();
                }
            }
        });

        let handles = self.tasks.entry(context).or_default();
        handles.retain(|h| !h.is_finished());
        handles.push(handle.abort_handle());
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        for (_, handles) in self.tasks.drain() {
            for handle in handles {
                handle.abort();
            }
        }
    }
}
