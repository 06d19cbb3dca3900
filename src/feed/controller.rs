use super::error::FetchFailure;
use super::event::FeedEvent;
use super::session::{FetchSession, SessionId};
use super::state::{FeedState, Phase};
use super::subscription::SubscriptionBridge;
use crate::config::Config;
use crate::remote::{FeedClient, FeedPage, PageQuery};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Static inputs the controller needs from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub categories: Vec<String>,
    pub default_category: String,
    pub page_size: u32,
    pub page_sizes: Vec<u32>,
    pub sort: String,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            categories: config.categories.clone(),
            default_category: config.default_category.clone(),
            page_size: config.page_size,
            page_sizes: config.page_sizes.clone(),
            sort: config.sort.clone(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The feed state machine.
///
/// All mutation of [`FeedState`] happens here, through `&mut self`, one
/// intent or event at a time. Background work (page fetches, realtime
/// notifications) only ever sends [`FeedEvent`]s on `event_tx`; the owner
/// drains the receiving end and feeds each event to [`handle_event`].
///
/// At most one [`FetchSession`] is live. Starting a new one cancels the
/// previous, and resolutions are applied only when their [`SessionId`]
/// matches the live session. Session ids are the only supersession
/// mechanism: an in-place refresh of page 1 gets a fresh id like any other
/// fetch.
///
/// [`handle_event`]: FeedController::handle_event
pub struct FeedController {
    client: Arc<dyn FeedClient>,
    settings: ControllerSettings,
    state: FeedState,
    live: Option<FetchSession>,
    next_session: u64,
    bridge: SubscriptionBridge,
    event_tx: mpsc::Sender<FeedEvent>,
    started: bool,
    shut_down: bool,
}

impl FeedController {
    pub fn new(
        client: Arc<dyn FeedClient>,
        settings: ControllerSettings,
        event_tx: mpsc::Sender<FeedEvent>,
    ) -> Self {
        let state = FeedState::new(settings.default_category.clone(), settings.page_size);
        Self {
            client,
            settings,
            state,
            live: None,
            next_session: 0,
            bridge: SubscriptionBridge::new(),
            event_tx,
            started: false,
            shut_down: false,
        }
    }

    /// Subscribe to remote changes and fetch the first page.
    ///
    /// Only the first call does anything. Must run inside a tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.started || self.shut_down {
            return false;
        }
        self.started = true;

        tracing::info!(
            category = %self.state.category,
            page_size = self.state.page_size,
            "Starting feed controller"
        );
        self.bridge
            .ensure_subscribed(self.client.as_ref(), &self.event_tx);
        self.begin_fetch(1);
        true
    }

    /// Switch to `category`, dropping everything loaded for the previous one.
    ///
    /// Selecting the current category is a no-op, except after a failure,
    /// where it retries. Unknown categories are rejected.
    pub fn select_category(&mut self, category: &str) -> bool {
        if self.shut_down {
            return false;
        }
        if !self.settings.categories.iter().any(|c| c == category) {
            tracing::warn!(category = %category, "Ignoring unknown category");
            return false;
        }
        if category == self.state.category {
            if self.state.error.is_some() {
                return self.retry();
            }
            return false;
        }

        tracing::debug!(from = %self.state.category, to = %category, "Category changed");
        self.state.category = category.to_string();
        self.reset_to_first_page();
        true
    }

    /// Ask for the page after the highest one loaded.
    ///
    /// No-op while a fetch is outstanding or once the last page is in.
    pub fn request_next_page(&mut self) -> bool {
        if self.shut_down || !self.started || self.state.loading || !self.state.has_more {
            return false;
        }
        let next = self.state.page.saturating_add(1);
        self.begin_fetch(next);
        true
    }

    /// Re-issue the page that failed.
    pub fn retry(&mut self) -> bool {
        if self.shut_down || !self.started || self.state.error.is_none() {
            return false;
        }
        tracing::debug!(page = self.state.page, category = %self.state.category, "Retrying");
        self.state.error = None;
        self.state.has_more = true;
        let page = self.state.page;
        self.begin_fetch(page);
        true
    }

    /// Change the page size. Only sizes from the configured list are accepted.
    pub fn set_page_size(&mut self, size: u32) -> bool {
        if self.shut_down || size == self.state.page_size {
            return false;
        }
        if !self.settings.page_sizes.contains(&size) {
            tracing::warn!(size, "Ignoring page size not in the configured list");
            return false;
        }
        tracing::debug!(from = self.state.page_size, to = size, "Page size changed");
        self.state.page_size = size;
        self.reset_to_first_page();
        true
    }

    /// React to a change in the remote collection.
    ///
    /// On page 1 the page is refetched in place and the current items stay
    /// visible until the new ones arrive. Deeper in the feed, pagination is
    /// discarded and the feed restarts from page 1. Ignored after a failure.
    pub fn on_realtime_event(&mut self) -> bool {
        if self.shut_down || !self.started {
            return false;
        }
        if self.state.error.is_some() {
            tracing::debug!("Ignoring realtime event while failed");
            return false;
        }

        if self.state.page > 1 {
            tracing::debug!(page = self.state.page, "Realtime change, resetting to page 1");
            self.reset_to_first_page();
        } else {
            self.begin_fetch(1);
            tracing::debug!(
                session = ?self.live.as_ref().map(FetchSession::id),
                "Realtime change, refreshing page 1 in place"
            );
        }
        true
    }

    /// Route one queued event. Returns `true` if the snapshot changed.
    pub fn handle_event(&mut self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::FetchFinished { session, outcome } => match outcome {
                Ok(page) => self.on_fetch_succeeded(session, page),
                Err(failure) => self.on_fetch_failed(session, failure),
            },
            FeedEvent::RemoteChanged => {
                self.bridge.acknowledge();
                self.on_realtime_event()
            }
            FeedEvent::TaskPanicked {
                task,
                session,
                error,
            } => match session {
                Some(id) if self.is_live(id) => {
                    self.on_fetch_failed(id, FetchFailure::Unclassified(error))
                }
                _ => {
                    tracing::debug!(task, error = %error, "Ignoring panic from a stale task");
                    false
                }
            },
        }
    }

    /// Apply a page returned by session `id`.
    pub fn on_fetch_succeeded(&mut self, id: SessionId, page: FeedPage) -> bool {
        if !self.is_live(id) {
            tracing::debug!(session = %id, "Ignoring stale fetch result");
            return false;
        }
        let Some(session) = self.live.take() else {
            return false;
        };
        let requested = session.page();
        drop(session);

        let has_more = page.has_more();
        let received = page.items.len();
        if requested <= 1 {
            self.state.items = page.items;
        } else {
            let mut seen: HashSet<String> =
                self.state.items.iter().map(|item| item.id.clone()).collect();
            let before = self.state.items.len();
            self.state
                .items
                .extend(page.items.into_iter().filter(|item| seen.insert(item.id.clone())));
            let skipped = received - (self.state.items.len() - before);
            if skipped > 0 {
                tracing::debug!(session = %id, skipped, "Skipped duplicate items on append");
            }
        }

        self.state.has_more = has_more;
        self.state.total_items = Some(page.total_items);
        self.state.total_pages = Some(page.total_pages);
        self.state.loading = false;
        self.state.error = None;
        self.state.phase = Phase::Loaded;

        tracing::debug!(
            session = %id,
            page = requested,
            received,
            total = self.state.items.len(),
            has_more = self.state.has_more,
            "Fetch applied"
        );
        true
    }

    /// Record a failure reported by session `id`.
    pub fn on_fetch_failed(&mut self, id: SessionId, failure: FetchFailure) -> bool {
        if failure.is_cancelled() {
            tracing::debug!(session = %id, "Fetch cancelled");
            return false;
        }
        if !self.is_live(id) {
            tracing::debug!(session = %id, "Ignoring stale fetch failure");
            return false;
        }
        let page = self.live.take().map(|s| s.page()).unwrap_or(self.state.page);

        tracing::warn!(
            session = %id,
            page,
            category = %self.state.category,
            error = %failure,
            "Fetch failed"
        );
        self.state.error = failure.user_message();
        self.state.has_more = false;
        self.state.loading = false;
        self.state.phase = Phase::Failed;
        true
    }

    /// Cancel outstanding work and release the subscription.
    ///
    /// Only the first call does anything; dropping the controller calls it too.
    pub fn shutdown(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        self.shut_down = true;
        if let Some(mut session) = self.live.take() {
            session.cancel();
        }
        self.bridge.release();
        self.state.loading = false;
        if self.state.phase == Phase::Loading {
            self.state.phase = Phase::Idle;
        }
        tracing::info!("Feed controller shut down");
        true
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn categories(&self) -> &[String] {
        &self.settings.categories
    }

    pub fn page_sizes(&self) -> &[u32] {
        &self.settings.page_sizes
    }

    pub fn live_session(&self) -> Option<&FetchSession> {
        self.live.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.bridge.is_subscribed()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn is_live(&self, id: SessionId) -> bool {
        self.live
            .as_ref()
            .is_some_and(|s| s.id() == id && !s.is_cancelled())
    }

    /// Clear pagination for the current category/page size and refetch.
    fn reset_to_first_page(&mut self) {
        self.state.items.clear();
        self.state.page = 1;
        self.state.has_more = true;
        self.state.error = None;
        self.state.total_items = None;
        self.state.total_pages = None;
        self.state.loading = true;
        if self.started {
            self.begin_fetch(1);
        } else {
            self.state.phase = Phase::Idle;
        }
    }

    fn begin_fetch(&mut self, page: u32) {
        if let Some(mut previous) = self.live.take() {
            previous.cancel();
        }

        self.next_session += 1;
        let id = SessionId::new(self.next_session);
        let query = PageQuery {
            category: self.state.category.clone(),
            page,
            page_size: self.state.page_size,
            sort: self.settings.sort.clone(),
        };

        self.state.page = page;
        self.state.loading = true;
        self.state.phase = Phase::Loading;
        self.live = Some(FetchSession::spawn(
            id,
            query,
            Arc::clone(&self.client),
            self.event_tx.clone(),
        ));
    }
}

impl Drop for FeedController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FeedController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedController")
            .field("state", &self.state)
            .field("live", &self.live)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
