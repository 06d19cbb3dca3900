//! Feed synchronization: turning user intents into ordered, cancel-safe
//! page fetches.
//!
//! # Architecture
//!
//! - [`FeedController`] - The state machine; sole writer of [`FeedState`]
//! - `session` - One cancellable page request on a spawned task
//! - `subscription` - The single realtime change subscription
//! - [`ScrollTrigger`] - Rate-limited "near the bottom" detector
//!
//! Background tasks never touch state. They send [`FeedEvent`]s that the
//! owner of the controller passes to [`FeedController::handle_event`]:
//!
//! ```ignore
//! let (event_tx, mut event_rx) = mpsc::channel(64);
//! let mut controller = FeedController::new(client, settings, event_tx);
//! controller.start();
//!
//! while let Some(event) = event_rx.recv().await {
//!     if controller.handle_event(event) {
//!         redraw(controller.state());
//!     }
//! }
//! ```

mod controller;
mod error;
mod event;
mod scroll;
mod session;
mod state;
mod subscription;

pub use controller::{ControllerSettings, FeedController};
pub use error::FetchFailure;
pub use event::FeedEvent;
pub use scroll::{ScrollPosition, ScrollTrigger, DEFAULT_INTERVAL, DEFAULT_THRESHOLD};
pub use session::{FetchSession, SessionId};
pub use state::{FeedState, Phase};
pub use subscription::SubscriptionBridge;
