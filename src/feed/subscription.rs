use super::event::FeedEvent;
use crate::remote::{ChangeCallback, FeedClient, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Owns the controller's single change subscription.
///
/// Subscribing is attempted at most once per bridge, whether or not the
/// attempt succeeds. Notifications that arrive while one is already queued
/// are coalesced: the controller refetches anyway, so one pending
/// [`FeedEvent::RemoteChanged`] covers them all.
#[derive(Debug, Default)]
pub struct SubscriptionBridge {
    subscription: Option<Subscription>,
    attempted: bool,
    pending: Arc<AtomicBool>,
}

impl SubscriptionBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe through `client` unless already attempted.
    ///
    /// Returns `true` only when this call established the subscription.
    pub fn ensure_subscribed(
        &mut self,
        client: &dyn FeedClient,
        tx: &mpsc::Sender<FeedEvent>,
    ) -> bool {
        if self.attempted {
            return false;
        }
        self.attempted = true;

        let pending = Arc::clone(&self.pending);
        let tx = tx.clone();
        let on_change: ChangeCallback = Arc::new(move || {
            if pending.swap(true, Ordering::AcqRel) {
                return;
            }
            if let Err(e) = tx.try_send(FeedEvent::RemoteChanged) {
                pending.store(false, Ordering::Release);
                tracing::warn!(error = %e, "Dropped realtime notification");
            }
        });

        match client.subscribe(on_change) {
            Ok(subscription) => {
                tracing::info!("Realtime subscription established");
                self.subscription = Some(subscription);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Realtime subscription failed; live updates disabled");
                false
            }
        }
    }

    /// Mark the queued notification as consumed so the next change is delivered.
    pub fn acknowledge(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Release the subscription. Returns `true` only on the first effective release.
    pub fn release(&mut self) -> bool {
        match self.subscription.take() {
            Some(mut subscription) => {
                let released = subscription.release();
                if released {
                    tracing::info!("Realtime subscription released");
                }
                released
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|s| !s.is_released())
    }
}

impl Drop for SubscriptionBridge {
    fn drop(&mut self) {
        self.release();
    }
}
