use super::error::FetchFailure;
use super::event::FeedEvent;
use crate::remote::{FeedClient, PageQuery};
use crate::util::catch_task_panic;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Unique, monotonically increasing identifier of a fetch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One outstanding page request.
///
/// The request runs on a spawned task that reports back through the
/// controller's event channel. Once cancelled, the task never reports.
/// Dropping a session cancels it.
pub struct FetchSession {
    id: SessionId,
    query: PageQuery,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl FetchSession {
    /// Start fetching `query` in the background.
    pub(crate) fn spawn(
        id: SessionId,
        query: PageQuery,
        client: Arc<dyn FeedClient>,
        tx: mpsc::Sender<FeedEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_query = query.clone();

        let handle = tokio::spawn(async move {
            let tx_panic = tx.clone();
            let work = async {
                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(FetchFailure::Cancelled),
                    result = client.query(&task_query) => result.map_err(FetchFailure::from),
                };

                if token.is_cancelled() {
                    tracing::debug!(session = %id, "Fetch cancelled before delivery");
                    return;
                }

                if let Err(e) = tx.send(FeedEvent::FetchFinished { session: id, outcome }).await {
                    tracing::warn!(error = %e, session = %id, "Channel send failed (receiver dropped)");
                }
            };

            if let Err(panic_msg) = catch_task_panic(work).await {
                tracing::error!(task = "fetch", session = %id, error = %panic_msg, "Background task panicked");
                let _ = tx_panic
                    .send(FeedEvent::TaskPanicked {
                        task: "fetch",
                        session: Some(id),
                        error: panic_msg,
                    })
                    .await;
            }
        });

        tracing::debug!(
            session = %id,
            category = %query.category,
            page = query.page,
            page_size = query.page_size,
            "Fetch session started"
        );

        Self {
            id,
            query,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn page(&self) -> u32 {
        self.query.page
    }

    pub fn category(&self) -> &str {
        &self.query.category
    }

    pub fn query(&self) -> &PageQuery {
        &self.query
    }

    /// Abandon the request. Safe to call any number of times.
    pub fn cancel(&mut self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                tracing::debug!(session = %self.id, page = self.query.page, "Aborted fetch session");
            }
            handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for FetchSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for FetchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchSession")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
