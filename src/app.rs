use crate::feed::{FeedController, FeedEvent, FeedState, ScrollPosition, ScrollTrigger};
use crate::remote::FeedItem;
use crate::util::checked_image_link;
use ratatui::widgets::ListState;
use std::borrow::Cow;
use tokio::time::Instant;

/// How long a status message stays on screen.
const STATUS_TTL_SECS: u64 = 3;

/// Number of frames in the loading spinner animation.
pub const SPINNER_FRAMES: usize = 10;

/// Terminal-side state wrapped around the feed controller.
///
/// The controller owns the feed; `App` owns only what the terminal needs on
/// top of it: the cursor, the visible window, and transient status text.
/// Every cursor move is reported to the [`ScrollTrigger`], which decides
/// whether the next page should be requested.
pub struct App {
    pub controller: FeedController,
    pub trigger: ScrollTrigger,
    /// Cursor index into `controller.state().items`.
    pub selected: usize,
    pub list_state: ListState,
    /// Number of records that fit in the list area, updated by the renderer.
    pub viewport_rows: usize,
    pub needs_redraw: bool,
    pub spinner_frame: usize,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
}

impl App {
    pub fn new(controller: FeedController, trigger: ScrollTrigger) -> Self {
        Self {
            controller,
            trigger,
            selected: 0,
            list_state: ListState::default(),
            viewport_rows: 1,
            needs_redraw: true,
            spinner_frame: 0,
            status_message: None,
        }
    }

    pub fn feed(&self) -> &FeedState {
        self.controller.state()
    }

    pub fn selected_item(&self) -> Option<&FeedItem> {
        self.feed().items.get(self.selected)
    }

    /// Index of the active category within the configured list.
    pub fn category_index(&self) -> usize {
        let current = &self.feed().category;
        self.controller
            .categories()
            .iter()
            .position(|c| c == current)
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------------
    // Feed events
    // ------------------------------------------------------------------------

    /// Pass a queued background event to the controller.
    pub fn handle_feed_event(&mut self, event: FeedEvent) {
        if self.controller.handle_event(event) {
            self.clamp_selection();
            self.needs_redraw = true;
        }
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn select_next(&mut self, n: usize) {
        let len = self.feed().items.len();
        if len == 0 {
            return;
        }
        self.selected = self.selected.saturating_add(n).min(len - 1);
        self.after_move();
    }

    pub fn select_prev(&mut self, n: usize) {
        self.selected = self.selected.saturating_sub(n);
        self.after_move();
    }

    pub fn page_down(&mut self) {
        self.select_next(self.viewport_rows.max(1));
    }

    pub fn page_up(&mut self) {
        self.select_prev(self.viewport_rows.max(1));
    }

    pub fn select_last(&mut self) {
        let len = self.feed().items.len();
        self.select_next(len);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
        self.after_move();
    }

    /// Where the visible window sits, in records.
    pub fn scroll_position(&self) -> ScrollPosition {
        let viewport = self.viewport_rows.max(1);
        let offset = self.list_state.offset();
        let top = if self.selected < offset {
            self.selected
        } else {
            offset.max((self.selected + 1).saturating_sub(viewport))
        };
        ScrollPosition::new(top, viewport, self.feed().items.len())
    }

    fn after_move(&mut self) {
        self.needs_redraw = true;
        let position = self.scroll_position();
        if self.trigger.observe(position, self.controller.state()) {
            tracing::debug!(
                selected = self.selected,
                distance = position.distance_to_bottom(),
                "Near bottom, requesting next page"
            );
            self.controller.request_next_page();
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.feed().items.len();
        if len == 0 {
            self.selected = 0;
            *self.list_state.offset_mut() = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    fn reset_cursor(&mut self) {
        self.selected = 0;
        *self.list_state.offset_mut() = 0;
        self.needs_redraw = true;
    }

    // ------------------------------------------------------------------------
    // Intents
    // ------------------------------------------------------------------------

    pub fn select_category_at(&mut self, index: usize) {
        let Some(name) = self.controller.categories().get(index).cloned() else {
            return;
        };
        if self.controller.select_category(&name) {
            self.reset_cursor();
        }
    }

    pub fn next_category(&mut self) {
        let count = self.controller.categories().len();
        if count > 0 {
            self.select_category_at((self.category_index() + 1) % count);
        }
    }

    pub fn prev_category(&mut self) {
        let count = self.controller.categories().len();
        if count > 0 {
            self.select_category_at((self.category_index() + count - 1) % count);
        }
    }

    /// Explicit "load more", bypassing the scroll trigger.
    pub fn load_more(&mut self) {
        if self.controller.request_next_page() {
            self.needs_redraw = true;
        } else if self.feed().reached_end() {
            self.set_status("No more prompts");
        }
    }

    pub fn retry(&mut self) {
        if self.controller.retry() {
            self.needs_redraw = true;
        }
    }

    /// Step to the next (or previous) allowed page size, wrapping around.
    pub fn cycle_page_size(&mut self, forward: bool) {
        let sizes = self.controller.page_sizes();
        if sizes.is_empty() {
            return;
        }
        let current = self.feed().page_size;
        let index = sizes.iter().position(|&s| s == current);
        let next = match (index, forward) {
            (Some(i), true) => sizes[(i + 1) % sizes.len()],
            (Some(i), false) => sizes[(i + sizes.len() - 1) % sizes.len()],
            (None, _) => sizes[0],
        };
        if self.controller.set_page_size(next) {
            self.reset_cursor();
            self.set_status(format!("{} prompts per page", next));
        }
    }

    /// Open the selected record's image in the system browser.
    pub fn open_selected(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        match checked_image_link(item.image_url()) {
            Ok(url) => {
                if let Err(e) = open::that(url.as_str()) {
                    self.set_status(format!("Failed to open browser: {}", e));
                } else {
                    self.set_status("Opening image...");
                }
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    pub fn shutdown(&mut self) {
        self.controller.shutdown();
    }

    // ------------------------------------------------------------------------
    // Status line
    // ------------------------------------------------------------------------

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
        self.needs_redraw = true;
    }

    /// Clear status message if expired. Returns true if a message was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    /// Advance the spinner while a fetch is outstanding.
    pub fn tick(&mut self) {
        if self.feed().loading {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES;
            self.needs_redraw = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ControllerSettings;
    use crate::remote::{ChangeCallback, FeedClient, FeedPage, PageQuery, RemoteError, Subscription};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time;

    /// Serves `total_pages` pages of `per_page` records for every query.
    struct PagedClient {
        per_page: usize,
        total_pages: u32,
        seen: Mutex<Vec<PageQuery>>,
    }

    #[async_trait]
    impl FeedClient for PagedClient {
        async fn query(&self, query: &PageQuery) -> Result<FeedPage, RemoteError> {
            self.seen.lock().unwrap().push(query.clone());
            let items = (0..self.per_page)
                .map(|i| FeedItem {
                    id: format!("{}-{}-{}", query.category, query.page, i),
                    collection_id: String::new(),
                    collection_name: String::new(),
                    prompt: format!("prompt {}", i),
                    url: "https://cdn.example.com/a.jpg".into(),
                    publish_url: String::new(),
                    category: query.category.clone(),
                    created: None,
                })
                .collect();
            Ok(FeedPage {
                items,
                page: query.page,
                per_page: query.page_size,
                total_items: self.per_page as u64 * self.total_pages as u64,
                total_pages: self.total_pages,
            })
        }

        fn subscribe(&self, _on_change: ChangeCallback) -> Result<Subscription, RemoteError> {
            Ok(Subscription::new(|| {}))
        }
    }

    fn test_app(total_pages: u32) -> (App, Arc<PagedClient>, mpsc::Receiver<FeedEvent>) {
        let client = Arc::new(PagedClient {
            per_page: 10,
            total_pages,
            seen: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::channel(16);
        let controller = FeedController::new(client.clone(), ControllerSettings::default(), tx);
        let mut app = App::new(controller, ScrollTrigger::new(3, Duration::from_millis(200)));
        app.viewport_rows = 5;
        app.controller.start();
        (app, client, rx)
    }

    async fn pump(app: &mut App, rx: &mut mpsc::Receiver<FeedEvent>) {
        let event = rx.recv().await.unwrap();
        app.handle_feed_event(event);
    }

    #[tokio::test]
    async fn test_cursor_near_bottom_requests_next_page() {
        let (mut app, client, mut rx) = test_app(3);
        pump(&mut app, &mut rx).await;
        assert_eq!(app.feed().items.len(), 10);

        app.select_next(3);
        assert!(!app.feed().loading);

        app.select_next(3);
        assert!(app.feed().loading);
        assert_eq!(app.feed().page, 2);

        pump(&mut app, &mut rx).await;
        assert_eq!(app.feed().items.len(), 20);
        assert_eq!(client.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_request_past_last_page() {
        let (mut app, client, mut rx) = test_app(1);
        pump(&mut app, &mut rx).await;

        app.select_last();
        app.load_more();
        assert!(!app.feed().loading);
        assert_eq!(client.seen.lock().unwrap().len(), 1);
        assert_eq!(
            app.status_message.as_ref().map(|(m, _)| m.as_ref()),
            Some("No more prompts")
        );
    }

    #[tokio::test]
    async fn test_category_cycle_resets_cursor() {
        let (mut app, _client, mut rx) = test_app(2);
        pump(&mut app, &mut rx).await;
        app.select_next(2);

        app.next_category();
        assert_eq!(app.feed().category, "NỮ");
        assert_eq!(app.selected, 0);
        assert!(app.feed().items.is_empty());

        app.prev_category();
        app.prev_category();
        assert_eq!(app.feed().category, "PROMPT KHÁC");
    }

    #[tokio::test]
    async fn test_cycle_page_size_wraps() {
        let (mut app, _client, _rx) = test_app(2);
        app.cycle_page_size(true);
        assert_eq!(app.feed().page_size, 20);
        app.cycle_page_size(true);
        app.cycle_page_size(true);
        assert_eq!(app.feed().page_size, 10);
        app.cycle_page_size(false);
        assert_eq!(app.feed().page_size, 50);
    }

    #[tokio::test]
    async fn test_status_expires_after_3_seconds() {
        let (mut app, _client, _rx) = test_app(1);
        time::pause();
        app.set_status("Test message");

        time::advance(Duration::from_secs(2)).await;
        assert!(!app.clear_expired_status());
        assert!(app.status_message.is_some());

        time::advance(Duration::from_secs(2)).await;
        assert!(app.clear_expired_status());
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_scroll_position_tracks_window() {
        let (mut app, _client, mut rx) = test_app(5);
        pump(&mut app, &mut rx).await;
        app.viewport_rows = 4;

        app.selected = 1;
        assert_eq!(app.scroll_position(), ScrollPosition::new(0, 4, 10));
        app.selected = 6;
        assert_eq!(app.scroll_position(), ScrollPosition::new(3, 4, 10));
        assert_eq!(app.scroll_position().distance_to_bottom(), 3);
    }
}
