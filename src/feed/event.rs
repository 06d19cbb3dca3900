use super::error::FetchFailure;
use super::session::SessionId;
use crate::remote::FeedPage;

/// Work queued for the controller by background tasks.
///
/// Sessions and the realtime bridge only ever send these; the owner of the
/// controller drains the channel and hands each one to
/// [`super::FeedController::handle_event`].
#[derive(Debug)]
pub enum FeedEvent {
    /// A fetch session resolved.
    FetchFinished {
        session: SessionId,
        outcome: Result<FeedPage, FetchFailure>,
    },
    /// The remote collection changed.
    RemoteChanged,
    /// A background task panicked.
    ///
    /// Fields:
    /// - `task`: Name of the task that panicked (e.g. "fetch")
    /// - `session`: The session it belonged to, if any
    /// - `error`: The panic message extracted from the payload
    TaskPanicked {
        task: &'static str,
        session: Option<SessionId>,
        error: String,
    },
}
