use anyhow::Result;
use chrono::Utc;
use eframe::egui;
use egui::{Color32, CornerRadius, RichText, ScrollArea, Stroke, Ui};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use hn_reader::comments::{count_descendants, CommentThread};
use hn_reader::config::ReaderConfig;
use hn_reader::db::Database;
use hn_reader::feed::Feed;
use hn_reader::hn_client::HackerNewsClient;
use hn_reader::interactions::Interactions;
use hn_reader::loader::{LoadContext, LoadEvent, Loader};
use hn_reader::models::{time_ago, CommentNode, FeedEntry, FeedKind, Item, ItemId};
use hn_reader::profile::UserProfile;
use hn_reader::sanitize;

const PREVIEW_CHARS: usize = 120;

pub struct AppTheme {
    background: Color32,
    card_background: Color32,
    text: Color32,
    secondary_text: Color32,
    highlight: Color32,
    accent: Color32,
    separator: Color32,
    score_high: Color32,
    score_medium: Color32,
    score_low: Color32,
    error: Color32,
    button_background: Color32,
    button_foreground: Color32,
    button_active_background: Color32,
    button_hover_background: Color32,
}

impl AppTheme {
    pub fn dark() -> Self {
        Self {
            background: Color32::from_rgb(18, 18, 18),
            card_background: Color32::from_rgb(30, 30, 30),
            text: Color32::from_rgb(240, 240, 240),
            secondary_text: Color32::from_rgb(180, 180, 180),
            highlight: Color32::from_rgb(255, 102, 0), // HN orange
            accent: Color32::from_rgb(255, 153, 51),
            separator: Color32::from_rgb(60, 60, 60),
            score_high: Color32::from_rgb(76, 175, 80),
            score_medium: Color32::from_rgb(255, 193, 7),
            score_low: Color32::from_rgb(158, 158, 158),
            error: Color32::from_rgb(239, 83, 80),
            button_background: Color32::from_rgb(66, 66, 66),
            button_foreground: Color32::from_rgb(240, 240, 240),
            button_active_background: Color32::from_rgb(255, 102, 0),
            button_hover_background: Color32::from_rgb(80, 80, 80),
        }
    }

    pub fn light() -> Self {
        Self {
            background: Color32::from_rgb(245, 245, 245),
            card_background: Color32::from_rgb(255, 255, 255),
            text: Color32::from_rgb(20, 20, 20),
            secondary_text: Color32::from_rgb(90, 90, 90),
            highlight: Color32::from_rgb(235, 92, 0),
            accent: Color32::from_rgb(220, 110, 20),
            separator: Color32::from_rgb(200, 200, 200),
            score_high: Color32::from_rgb(30, 110, 40),
            score_medium: Color32::from_rgb(190, 130, 0),
            score_low: Color32::from_rgb(80, 80, 80),
            error: Color32::from_rgb(198, 40, 40),
            button_background: Color32::from_rgb(235, 235, 235),
            button_foreground: Color32::from_rgb(20, 20, 20),
            button_active_background: Color32::from_rgb(235, 92, 0),
            button_hover_background: Color32::from_rgb(210, 210, 210),
        }
    }

    fn is_dark(&self) -> bool {
        self.background.r() <= 128
    }

    fn apply_to_ctx(&self, ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        style.visuals.panel_fill = self.background;
        style.visuals.window_fill = self.card_background;
        style.visuals.window_stroke = Stroke::new(1.0, self.separator);
        style.visuals.widgets.noninteractive.bg_fill = self.card_background;
        style.visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, self.text);

        style.visuals.widgets.inactive.bg_fill = self.button_background;
        style.visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.active.bg_fill = self.button_active_background;
        style.visuals.widgets.active.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.hovered.bg_fill = self.button_hover_background;
        style.visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, self.button_foreground);

        style.visuals.selection.bg_fill = self.highlight;
        style.visuals.selection.stroke = Stroke::new(1.0, self.highlight);

        style.visuals.window_corner_radius = CornerRadius::same(8);
        style.visuals.widgets.inactive.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.hovered.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.active.corner_radius = CornerRadius::same(4);

        ctx.set_style(style);
    }

    fn score_color(&self, score: i64) -> Color32 {
        if score >= 300 {
            self.score_high
        } else if score >= 100 {
            self.score_medium
        } else {
            self.score_low
        }
    }

    fn title_color(&self, score: i64, is_read: bool) -> Color32 {
        if is_read {
            self.secondary_text
        } else if score >= 300 {
            self.score_high
        } else if score >= 100 {
            self.score_medium
        } else {
            self.text
        }
    }

    fn card_stroke(&self, score: i64) -> Stroke {
        if score >= 500 {
            Stroke::new(2.0, self.score_high)
        } else if score >= 100 {
            Stroke::new(1.2, self.score_medium.gamma_multiply(0.6))
        } else {
            Stroke::new(1.0, self.separator)
        }
    }

    /// Alternates comment card shades by nesting level.
    fn comment_background(&self, depth: usize) -> Color32 {
        if depth % 2 == 1 {
            return self.card_background;
        }
        let c = self.card_background;
        if self.is_dark() {
            Color32::from_rgb(c.r().saturating_add(8), c.g().saturating_add(8), c.b().saturating_add(8))
        } else {
            Color32::from_rgb(c.r().saturating_sub(10), c.g().saturating_sub(10), c.b().saturating_sub(10))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Feed,
    Story,
    Profile,
}

/// Everything the user can ask for in a frame. Collected while drawing and
/// applied afterwards, so drawing only needs `&self`.
#[derive(Debug, Clone, PartialEq)]
enum UiAction {
    SwitchFeed(FeedKind),
    Refresh,
    LoadMore,
    RetryFeed,
    OpenStory(ItemId),
    RetryStory,
    ToggleComment(ItemId),
    ExpandComment(ItemId),
    AutoExpand(ItemId),
    ExpandAll(bool),
    ShowMoreComments,
    OpenProfile(String),
    RetryProfile,
    Back,
    MarkRead(ItemId),
    ToggleStar(ItemId),
    Hide(ItemId),
    OpenLink(String),
    ToggleTheme,
}

pub struct ReaderApp {
    loader: Loader,
    interactions: Interactions<Database>,
    feed: Feed,
    thread: CommentThread,
    profile: UserProfile,
    view: View,
    history: Vec<View>,
    theme: AppTheme,
    is_dark_mode: bool,
    max_indent: usize,
    status: Option<String>,
    started: bool,
    rendered_text: RefCell<HashMap<ItemId, String>>,
}

impl ReaderApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Result<Self> {
        let data_dir = ReaderConfig::default_data_dir()?;
        let config = ReaderConfig::load(&data_dir)?;
        info!(data_dir = %config.data_dir.display(), "starting reader");

        let database = Database::open_in_dir(&config.data_dir)?;
        let interactions = Interactions::load(database);
        let client = HackerNewsClient::new(&config)?;

        let mut loader = Loader::new(Arc::new(client), config.clone())?;
        let ctx = cc.egui_ctx.clone();
        loader.set_notify(Arc::new(move || ctx.request_repaint()));

        let is_dark_mode = cc
            .storage
            .and_then(|storage| storage.get_string("is_dark_mode"))
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(true);

        Ok(Self {
            loader,
            interactions,
            feed: Feed::new(FeedKind::Top, config.feed.clone()),
            thread: CommentThread::new(config.comments.clone()),
            profile: UserProfile::new(config.feed.profile_limit),
            view: View::Feed,
            history: Vec::new(),
            theme: if is_dark_mode { AppTheme::dark() } else { AppTheme::light() },
            is_dark_mode,
            max_indent: config.comments.max_indent,
            status: None,
            started: false,
            rendered_text: RefCell::new(HashMap::new()),
        })
    }

    fn poll_loader(&mut self) {
        while let Some(event) = self.loader.try_recv() {
            match event {
                LoadEvent::Story { ticket, result } => {
                    self.thread.finish_load(&ticket, result);
                }
                LoadEvent::Replies { ticket, children } => {
                    self.thread.finish_expand(&ticket, children);
                }
                LoadEvent::FeedIds { ticket, result } => {
                    if self.feed.finish_init(&ticket, result) {
                        self.request_page();
                    }
                }
                LoadEvent::FeedPage { ticket, result } => {
                    self.feed.finish_page(&ticket, result, &self.interactions);
                }
                LoadEvent::Profile { ticket, result } => {
                    self.profile.finish_load(&ticket, result, &self.interactions);
                }
            }
        }
    }

    fn switch_feed(&mut self, kind: FeedKind) {
        let ticket = self.feed.begin_init(kind, &self.interactions);
        self.loader.init_feed(ticket);
        self.view = View::Feed;
        self.history.clear();
    }

    fn request_page(&mut self) {
        if let Some(ticket) = self.feed.begin_page(&self.interactions) {
            self.loader.fetch_page(ticket);
        }
    }

    fn open_story(&mut self, id: ItemId) {
        self.mark_read(id);
        self.rendered_text.borrow_mut().clear();
        let ticket = self.thread.begin_load(id);
        self.loader.load_story(ticket);
        self.navigate(View::Story);
    }

    fn open_profile(&mut self, handle: &str) {
        let ticket = self.profile.begin_load(handle, &self.interactions);
        self.loader.load_profile(ticket);
        self.navigate(View::Profile);
    }

    fn navigate(&mut self, view: View) {
        if self.view != view {
            self.history.push(self.view);
        }
        self.view = view;
    }

    fn back(&mut self) {
        let previous = self.history.pop().unwrap_or(View::Feed);
        match self.view {
            View::Story => {
                self.loader.cancel(LoadContext::Story);
                self.thread.close();
            }
            View::Profile => self.loader.cancel(LoadContext::Profile),
            View::Feed => {}
        }
        self.view = previous;
        self.feed.sync_flags(&self.interactions);
        self.profile.sync_flags(&self.interactions);
    }

    fn mark_read(&mut self, id: ItemId) {
        let result = match self.view {
            View::Profile => self.profile.mark_read(&mut self.interactions, id),
            _ => self.feed.mark_read(&mut self.interactions, id),
        };
        self.report(result);
    }

    fn toggle_star(&mut self, id: ItemId) {
        let result = match self.view {
            View::Profile => self.profile.toggle_star(&mut self.interactions, id),
            _ => self.feed.toggle_star(&mut self.interactions, id),
        };
        self.report(result.map(|_| ()));
    }

    fn hide(&mut self, id: ItemId) {
        let result = match self.view {
            View::Profile => self.profile.hide_item(&mut self.interactions, id),
            _ => self.feed.hide_item(&mut self.interactions, id),
        };
        self.report(result);
    }

    fn report(&mut self, result: Result<()>) {
        if let Err(e) = result {
            error!("Failed to save interaction: {:#}", e);
            self.status = Some("Could not save your change. Please try again.".to_string());
        }
    }

    fn toggle_theme(&mut self) {
        self.is_dark_mode = !self.is_dark_mode;
        self.theme = if self.is_dark_mode { AppTheme::dark() } else { AppTheme::light() };
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::SwitchFeed(kind) => self.switch_feed(kind),
            UiAction::Refresh => {
                self.loader.invalidate();
                self.switch_feed(self.feed.requested_kind());
            }
            UiAction::LoadMore => self.request_page(),
            UiAction::RetryFeed => {
                if let Some(ticket) = self.feed.retry(&self.interactions) {
                    self.loader.feed_request(ticket);
                }
            }
            UiAction::OpenStory(id) => self.open_story(id),
            UiAction::RetryStory => {
                if let Some(ticket) = self.thread.retry() {
                    self.loader.load_story(ticket);
                }
            }
            UiAction::ToggleComment(id) => {
                if let Some(ticket) = self.thread.toggle_expansion(id) {
                    self.loader.expand(ticket);
                }
            }
            UiAction::ExpandComment(id) => {
                if let Some(ticket) = self.thread.begin_expand(id) {
                    self.loader.expand(ticket);
                }
            }
            UiAction::AutoExpand(id) => {
                if let Some(ticket) = self.thread.auto_expand(id) {
                    self.loader.expand(ticket);
                }
            }
            UiAction::ExpandAll(expanded) => self.thread.set_all_expanded(expanded),
            UiAction::ShowMoreComments => self.thread.show_more_top_level(),
            UiAction::OpenProfile(handle) => self.open_profile(&handle),
            UiAction::RetryProfile => {
                if let Some(ticket) = self.profile.retry(&self.interactions) {
                    self.loader.load_profile(ticket);
                }
            }
            UiAction::Back => self.back(),
            UiAction::MarkRead(id) => self.mark_read(id),
            UiAction::ToggleStar(id) => self.toggle_star(id),
            UiAction::Hide(id) => self.hide(id),
            UiAction::OpenLink(url) => {
                if let Err(e) = open::that(&url) {
                    error!("Failed to open URL {}: {}", url, e);
                }
            }
            UiAction::ToggleTheme => self.toggle_theme(),
        }
    }

    fn icon_button(&self, ui: &mut Ui, icon: &str, tooltip: &str) -> bool {
        let response = ui
            .add(
                egui::Button::new(RichText::new(icon).color(self.theme.button_foreground).size(20.0))
                    .min_size(egui::vec2(32.0, 32.0))
                    .corner_radius(CornerRadius::same(16))
                    .fill(self.theme.button_background),
            )
            .on_hover_text(tooltip);
        if response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }
        response.clicked()
    }

    fn render_header(&self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        ui.horizontal(|ui| {
            ui.heading(RichText::new("Hacker News Reader").color(self.theme.highlight).size(24.0));
            ui.add_space(20.0);

            for kind in FeedKind::ALL {
                let active = self.feed.requested_kind() == kind && self.view == View::Feed;
                let label = RichText::new(kind.label()).size(16.0).color(if active {
                    self.theme.highlight
                } else {
                    self.theme.button_foreground
                });
                let button = egui::Button::new(label)
                    .corner_radius(CornerRadius::same(6))
                    .fill(if active { self.theme.card_background } else { self.theme.button_background });
                if ui.add_sized([72.0, 30.0], button).clicked() {
                    actions.push(UiAction::SwitchFeed(kind));
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let theme_icon = if self.is_dark_mode { "☀" } else { "☾" };
                let theme_tip = if self.is_dark_mode { "Switch to Light Mode" } else { "Switch to Dark Mode" };
                if self.icon_button(ui, theme_icon, theme_tip) {
                    actions.push(UiAction::ToggleTheme);
                }
                ui.add_space(8.0);
                if self.icon_button(ui, "↻", "Refresh") {
                    actions.push(UiAction::Refresh);
                }
            });
        });
    }

    fn render_error(&self, ui: &mut Ui, message: &str, retry: UiAction, actions: &mut Vec<UiAction>) {
        egui::Frame::new()
            .fill(self.theme.card_background)
            .stroke(Stroke::new(1.0, self.theme.error))
            .corner_radius(CornerRadius::same(6))
            .inner_margin(10.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(message).color(self.theme.error).size(15.0));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Retry").clicked() {
                            actions.push(retry);
                        }
                    });
                });
            });
    }

    fn render_loading(&self, ui: &mut Ui, label: &str) {
        ui.vertical_centered(|ui| {
            ui.add_space(40.0);
            ui.spinner();
            ui.add_space(12.0);
            ui.label(RichText::new(label).color(self.theme.secondary_text).size(16.0));
        });
    }

    fn render_story_card(&self, ui: &mut Ui, rank: Option<usize>, entry: &FeedEntry, actions: &mut Vec<UiAction>) {
        let story = &entry.item;
        let now = Utc::now();

        egui::Frame::new()
            .fill(self.theme.card_background)
            .corner_radius(CornerRadius::same(8))
            .stroke(self.theme.card_stroke(story.score))
            .inner_margin(12.0)
            .outer_margin(egui::vec2(8.0, 6.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    if let Some(rank) = rank {
                        ui.label(RichText::new(rank.to_string()).color(self.theme.secondary_text).size(16.0));
                        ui.add_space(8.0);
                    }

                    let title = ui.add(
                        egui::Label::new(
                            RichText::new(story.title())
                                .color(self.theme.title_color(story.score, entry.is_read))
                                .size(16.0)
                                .strong(),
                        )
                        .sense(egui::Sense::click()),
                    );
                    if title.hovered() {
                        ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
                    }
                    if title.clicked() {
                        match &story.url {
                            Some(url) => {
                                actions.push(UiAction::MarkRead(story.id));
                                actions.push(UiAction::OpenLink(url.clone()));
                            }
                            None => actions.push(UiAction::OpenStory(story.id)),
                        }
                    }

                    if let Some(domain) = story.domain() {
                        ui.add_space(8.0);
                        ui.label(RichText::new(format!("({})", domain)).color(self.theme.secondary_text).italics());
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            RichText::new(format!("{} pts", story.score))
                                .color(self.theme.score_color(story.score))
                                .strong(),
                        );
                    });
                });

                ui.horizontal(|ui| {
                    ui.label(RichText::new("by").color(self.theme.secondary_text).size(14.0));
                    self.author_link(ui, story, actions);
                    ui.add_space(8.0);
                    ui.label(
                        RichText::new(time_ago(story.created(), now))
                            .color(self.theme.secondary_text)
                            .size(14.0),
                    );

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let comments = egui::Button::new(
                            RichText::new(format!("{} Comments", story.comment_count()))
                                .size(14.0)
                                .color(self.theme.button_foreground),
                        )
                        .corner_radius(CornerRadius::same(6))
                        .fill(self.theme.button_background);
                        if ui.add_sized([110.0, 28.0], comments).clicked() {
                            actions.push(UiAction::OpenStory(story.id));
                        }

                        if ui.button("Hide").on_hover_text("Never show this story again").clicked() {
                            actions.push(UiAction::Hide(story.id));
                        }

                        let (star, color) = if entry.is_starred {
                            ("★", self.theme.highlight)
                        } else {
                            ("☆", self.theme.secondary_text)
                        };
                        let star_button = egui::Button::new(RichText::new(star).color(color).size(18.0)).frame(false);
                        if ui.add(star_button).on_hover_text("Star").clicked() {
                            actions.push(UiAction::ToggleStar(story.id));
                        }
                    });
                });
            });
    }

    fn author_link(&self, ui: &mut Ui, item: &Item, actions: &mut Vec<UiAction>) {
        let author = ui.add(
            egui::Label::new(RichText::new(item.author()).color(self.theme.accent).strong().size(14.0))
                .sense(egui::Sense::click()),
        );
        if author.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }
        if author.clicked() {
            if let Some(handle) = &item.author {
                actions.push(UiAction::OpenProfile(handle.clone()));
            }
        }
    }

    fn render_feed(&self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        let kind = self.feed.requested_kind();
        ui.heading(RichText::new(format!("{} Stories", kind.label())).size(18.0).color(self.theme.text));
        ui.add_space(8.0);

        if let Some(message) = self.feed.error() {
            self.render_error(ui, message, UiAction::RetryFeed, actions);
            ui.add_space(8.0);
        }

        let switching = self.feed.is_switching();
        if (!self.feed.is_initialized() || switching) && self.feed.is_loading() {
            self.render_loading(ui, "Loading...");
            return;
        }
        // Entries still belong to the previous feed.
        if switching {
            return;
        }

        ScrollArea::vertical()
            .id_salt("stories_scroll_area")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for (index, entry) in self.feed.entries().iter().enumerate() {
                    self.render_story_card(ui, Some(index + 1), entry, actions);
                }

                ui.add_space(10.0);
                if self.feed.is_loading() {
                    ui.vertical_centered(|ui| {
                        ui.spinner();
                        ui.label(RichText::new("Loading more stories...").color(self.theme.secondary_text));
                    });
                } else if self.feed.has_more() {
                    // Reaching this marker counts as hitting the bottom.
                    let marker = ui.vertical_centered(|ui| ui.button("Load more")).inner;
                    if marker.clicked() || (self.feed.error().is_none() && ui.is_rect_visible(marker.rect)) {
                        actions.push(UiAction::LoadMore);
                    }
                } else if self.feed.is_initialized() {
                    let message = if self.feed.entries().is_empty() && kind == FeedKind::Starred {
                        "No starred stories yet."
                    } else {
                        "End of stories."
                    };
                    ui.vertical_centered(|ui| {
                        ui.label(RichText::new(message).color(self.theme.secondary_text).size(14.0));
                    });
                }
                ui.add_space(20.0);
            });
    }

    fn render_back(&self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        ui.horizontal(|ui| {
            let back = egui::Button::new(RichText::new("⬅").size(18.0).color(self.theme.button_foreground))
                .corner_radius(CornerRadius::same(6))
                .fill(self.theme.button_background);
            if ui.add_sized([40.0, 30.0], back).on_hover_text("Back (Backspace)").clicked() {
                actions.push(UiAction::Back);
            }
        });
    }

    fn render_story(&self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        self.render_back(ui, actions);

        if let Some(message) = self.thread.error() {
            ui.add_space(8.0);
            self.render_error(ui, message, UiAction::RetryStory, actions);
            return;
        }
        if self.thread.is_loading() {
            self.render_loading(ui, "Loading comments...");
            return;
        }
        let Some(story) = self.thread.story() else {
            return;
        };

        ScrollArea::vertical()
            .id_salt("comments_scroll_area")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                self.render_story_header(ui, story, actions);
                ui.add_space(8.0);

                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("{} comments", story.comment_count()))
                            .color(self.theme.text)
                            .strong(),
                    );
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Collapse all").clicked() {
                            actions.push(UiAction::ExpandAll(false));
                        }
                        if ui.button("Expand all").clicked() {
                            actions.push(UiAction::ExpandAll(true));
                        }
                    });
                });

                if self.thread.nodes().is_empty() {
                    ui.add_space(12.0);
                    ui.label(RichText::new("No comments yet.").color(self.theme.secondary_text).italics());
                }

                for node in self.thread.visible_nodes() {
                    self.render_comment(ui, node, actions);
                }

                if self.thread.has_more_top_level() {
                    ui.add_space(8.0);
                    ui.vertical_centered(|ui| {
                        let remaining = self.thread.nodes().len() - self.thread.visible_nodes().len();
                        if ui.button(format!("Show more comments ({} more)", remaining)).clicked() {
                            actions.push(UiAction::ShowMoreComments);
                        }
                    });
                }
                ui.add_space(20.0);
            });
    }

    fn render_story_header(&self, ui: &mut Ui, story: &Item, actions: &mut Vec<UiAction>) {
        let now = Utc::now();
        ui.add_space(8.0);
        ui.label(
            RichText::new(story.title())
                .size(22.0)
                .color(self.theme.title_color(story.score, false))
                .strong(),
        );

        egui::Frame::new()
            .fill(self.theme.card_background)
            .corner_radius(CornerRadius::same(8))
            .stroke(self.theme.card_stroke(story.score))
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("{} points", story.score))
                            .color(self.theme.score_color(story.score))
                            .strong(),
                    );
                    ui.label(RichText::new("by").color(self.theme.secondary_text));
                    self.author_link(ui, story, actions);
                    ui.label(RichText::new(time_ago(story.created(), now)).color(self.theme.secondary_text));

                    if let Some(url) = &story.url {
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            let label = story.domain().unwrap_or_else(|| "Open link".to_string());
                            if ui.link(label).clicked() {
                                actions.push(UiAction::OpenLink(url.clone()));
                            }
                        });
                    }
                });

                if let Some(text) = &story.text {
                    ui.add_space(8.0);
                    ui.label(RichText::new(self.rendered(story.id, text)).color(self.theme.text).size(15.0));
                }
            });
    }

    /// Sanitised body text, parsed once per story view.
    fn rendered(&self, id: ItemId, html: &str) -> String {
        self.rendered_text
            .borrow_mut()
            .entry(id)
            .or_insert_with(|| sanitize::comment_text(html))
            .clone()
    }

    fn render_comment(&self, ui: &mut Ui, node: &CommentNode, actions: &mut Vec<UiAction>) {
        let id = node.id();
        let state = self.thread.overlay().get(id);
        let indent = node.indent(self.max_indent);
        let now = Utc::now();

        egui::Frame::new()
            .fill(self.theme.comment_background(node.depth))
            .corner_radius(CornerRadius::same(6))
            .stroke(Stroke::new(1.0, self.theme.separator))
            .inner_margin(10.0)
            .outer_margin(egui::vec2(8.0, 4.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.add_space((indent * 16) as f32);

                    ui.vertical(|ui| {
                        ui.horizontal(|ui| {
                            let toggle = if state.expanded { "[-]" } else { "[+]" };
                            let button = egui::Button::new(
                                RichText::new(toggle).color(self.theme.text).monospace().size(16.0),
                            )
                            .small()
                            .frame(false);
                            let response = ui.add(button);
                            if response.hovered() {
                                ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
                            }
                            if response.clicked() {
                                actions.push(UiAction::ToggleComment(id));
                            }

                            ui.add_space(4.0);
                            self.author_link(ui, &node.item, actions);
                            ui.add_space(8.0);
                            ui.label(
                                RichText::new(time_ago(node.item.created(), now))
                                    .color(self.theme.secondary_text)
                                    .size(14.0),
                            );

                            if !state.expanded {
                                let replies = if node.children_loaded {
                                    count_descendants(node)
                                } else {
                                    node.item.child_ids.len()
                                };
                                if replies > 0 {
                                    ui.add_space(8.0);
                                    ui.label(
                                        RichText::new(format!("+{} replies", replies))
                                            .color(self.theme.secondary_text)
                                            .italics()
                                            .size(14.0),
                                    );
                                }
                            }
                        });

                        let body = node.item.text.as_deref().unwrap_or("");
                        if !state.expanded {
                            ui.label(
                                RichText::new(sanitize::preview(body, PREVIEW_CHARS))
                                    .color(self.theme.secondary_text)
                                    .size(14.0),
                            );
                            return;
                        }

                        ui.add_space(4.0);
                        ui.label(RichText::new(self.rendered(id, body)).color(self.theme.text).size(15.0));

                        if state.loading {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label(RichText::new("Loading replies...").color(self.theme.secondary_text));
                            });
                        } else if node.has_unloaded_children {
                            if node.depth < self.thread.settings().max_auto_fetch_depth {
                                actions.push(UiAction::AutoExpand(id));
                            } else {
                                let label = format!("Load {} replies", node.item.child_ids.len());
                                if ui.link(label).clicked() {
                                    actions.push(UiAction::ExpandComment(id));
                                }
                            }
                        }

                        if !node.children.is_empty() {
                            ui.add_space(8.0);
                            for child in &node.children {
                                self.render_comment(ui, child, actions);
                            }
                        }
                    });
                });
            });
    }

    fn render_profile(&self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        self.render_back(ui, actions);
        ui.add_space(8.0);

        if let Some(message) = self.profile.error() {
            self.render_error(ui, message, UiAction::RetryProfile, actions);
            return;
        }
        if self.profile.is_loading() {
            self.render_loading(ui, "Loading profile...");
            return;
        }
        let Some(user) = self.profile.user() else {
            return;
        };

        ScrollArea::vertical()
            .id_salt("profile_scroll_area")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.heading(RichText::new(&user.id).color(self.theme.highlight).size(22.0));
                let joined = chrono::DateTime::<Utc>::from_timestamp(user.created, 0).unwrap_or_default();
                ui.label(
                    RichText::new(format!("{} karma · joined {}", user.karma, joined.format("%b %-d, %Y")))
                        .color(self.theme.secondary_text),
                );
                if let Some(about) = &user.about {
                    ui.add_space(8.0);
                    ui.label(RichText::new(sanitize::comment_text(about)).color(self.theme.text));
                }

                ui.add_space(12.0);
                ui.label(RichText::new("Submissions").strong().color(self.theme.text));
                if self.profile.entries().is_empty() {
                    ui.label(RichText::new("No recent stories.").color(self.theme.secondary_text).italics());
                }
                for entry in self.profile.entries() {
                    self.render_story_card(ui, None, entry, actions);
                }
                ui.add_space(20.0);
            });
    }
}

impl eframe::App for ReaderApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        storage.set_string("is_dark_mode", self.is_dark_mode.to_string());
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.theme.apply_to_ctx(ctx);

        if !self.started {
            self.started = true;
            self.switch_feed(FeedKind::Top);
        }

        self.poll_loader();

        let mut actions = Vec::new();

        if self.view != View::Feed && ctx.input(|i| i.key_pressed(egui::Key::Backspace)) && !ctx.wants_keyboard_input() {
            actions.push(UiAction::Back);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_header(ui, &mut actions);
            ui.add(egui::Separator::default().spacing(8.0));

            if let Some(status) = &self.status {
                ui.label(RichText::new(status).color(self.theme.error));
            }

            match self.view {
                View::Feed => self.render_feed(ui, &mut actions),
                View::Story => self.render_story(ui, &mut actions),
                View::Profile => self.render_profile(ui, &mut actions),
            }
        });

        if !actions.is_empty() {
            self.status = None;
        }
        for action in actions {
            self.apply(action);
        }
    }
}
