//! Remote collection access.
//!
//! The feed controller talks to the backing store only through the
//! [`FeedClient`] trait, so tests can swap in a scripted double.
//!
//! - [`types`] - Records, pages, and query parameters
//! - [`pocketbase`] - HTTP implementation against a PocketBase server
//! - [`sse`] - Incremental decoder for the realtime event stream
//! - `realtime` - Background task that keeps the change subscription alive

mod pocketbase;
mod realtime;
pub mod sse;
mod types;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use pocketbase::PocketBaseClient;
pub use types::{FeedItem, FeedPage, PageQuery};

/// Errors raised by a [`FeedClient`] before classification.
///
/// These never reach the controller directly; the fetch session maps them
/// to a [`crate::feed::FetchFailure`] first.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    /// Non-2xx response without a decodable error body
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Structured error reported by the server
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },
    #[error("Invalid response body: {0}")]
    Decode(String),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Insecure base URL: HTTPS required (except localhost)")]
    InsecureBaseUrl,
    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),
    #[error("Realtime handshake failed: {0}")]
    Realtime(String),
}

/// Callback invoked on every remote create/update/delete.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle to a live change subscription.
///
/// Releasing runs the release hook at most once; dropping the handle
/// releases it too.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the subscription. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        match self.release.take() {
            Some(release) => {
                release();
                true
            }
            None => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Paginated query access plus a push channel for change notifications.
#[async_trait]
pub trait FeedClient: Send + Sync + 'static {
    /// Fetch one page, newest first.
    ///
    /// Dropping the returned future abandons the request.
    async fn query(&self, query: &PageQuery) -> Result<FeedPage, RemoteError>;

    /// Register `on_change` for collection-wide change notifications.
    ///
    /// Delivery is at-least-once and carries no payload. Must be called from
    /// within a tokio runtime.
    fn subscribe(&self, on_change: ChangeCallback) -> Result<Subscription, RemoteError>;
}
