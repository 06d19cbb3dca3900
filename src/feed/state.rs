use crate::remote::FeedItem;

/// Position of the controller's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No fetch issued yet, or shut down before the last one finished.
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// The externally observed feed snapshot.
///
/// Only [`super::FeedController`] writes it; everything else gets `&FeedState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    /// Newest first, in server order.
    pub items: Vec<FeedItem>,
    /// Highest requested page (1-based).
    pub page: u32,
    pub category: String,
    pub page_size: u32,
    pub loading: bool,
    pub has_more: bool,
    /// User-facing message for the last failure.
    pub error: Option<String>,
    pub total_items: Option<u64>,
    pub total_pages: Option<u32>,
    pub phase: Phase,
}

impl FeedState {
    pub(crate) fn new(category: String, page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            category,
            page_size,
            loading: true,
            has_more: true,
            error: None,
            total_items: None,
            total_pages: None,
            phase: Phase::Idle,
        }
    }

    /// Nothing to show and nothing coming: the "no prompts here" state.
    pub fn is_empty(&self) -> bool {
        !self.loading && self.items.is_empty() && self.error.is_none()
    }

    /// Every page has been loaded.
    pub fn reached_end(&self) -> bool {
        !self.loading && !self.has_more && self.error.is_none() && !self.items.is_empty()
    }
}
