//! PocketBase realtime subscription task.
//!
//! Protocol: open `GET /api/realtime` as an event stream, read the
//! `PB_CONNECT` event for the client id, then `POST /api/realtime` with the
//! topics to receive. Record events arrive named after the topic.

use super::sse::{SseDecoder, SseEvent};
use super::{ChangeCallback, RemoteError};
use futures::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
/// A registration that lasts this long resets the backoff.
const STABLE_CONNECTION: Duration = Duration::from_secs(30);
const CONNECT_EVENT: &str = "PB_CONNECT";

/// Everything the background task needs to (re)connect.
pub(super) struct RealtimeTarget {
    pub http: reqwest::Client,
    pub url: String,
    /// Topic registered with the server, e.g. `prompt/*`.
    pub topic: String,
    pub collection: String,
    pub headers: HeaderMap,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectPayload {
    client_id: String,
}

/// Outcome of one connection attempt.
#[derive(Debug, Default)]
struct ConnectionReport {
    /// When the subscription was registered, if it got that far.
    registered_at: Option<Instant>,
}

/// Reconnect bookkeeping carried across connections.
#[derive(Debug)]
struct Reconnect {
    backoff: Duration,
    /// A registered connection failed, so events may have been lost.
    missed_events: bool,
}

impl Reconnect {
    fn new() -> Self {
        Self {
            backoff: INITIAL_BACKOFF,
            missed_events: false,
        }
    }

    /// Record how a connection ended and return the delay before the next one.
    ///
    /// PocketBase closes idle clients cleanly; only an error after
    /// registration marks events as possibly missed.
    fn connection_ended(&mut self, report: &ConnectionReport, failed: bool, now: Instant) -> Duration {
        if let Some(registered_at) = report.registered_at {
            if failed {
                self.missed_events = true;
            }
            if now.saturating_duration_since(registered_at) >= STABLE_CONNECTION {
                self.backoff = INITIAL_BACKOFF;
            }
        }
        let delay = self.backoff;
        self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
        delay
    }

    /// Whether a freshly registered connection should emit a catch-up change.
    fn take_missed_events(&mut self) -> bool {
        std::mem::take(&mut self.missed_events)
    }
}

pub(super) fn spawn_realtime(
    target: RealtimeTarget,
    on_change: ChangeCallback,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut reconnect = Reconnect::new();

        loop {
            let mut report = ConnectionReport::default();
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = listen(&target, &on_change, &mut reconnect, &mut report) => result,
            };

            match &result {
                Ok(()) => tracing::debug!(topic = %target.topic, "Realtime stream ended"),
                Err(e) => tracing::warn!(topic = %target.topic, error = %e, "Realtime stream failed"),
            }

            let delay = reconnect.connection_ended(&report, result.is_err(), Instant::now());
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Reconnecting realtime stream");
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    })
}

async fn listen(
    target: &RealtimeTarget,
    on_change: &ChangeCallback,
    reconnect: &mut Reconnect,
    report: &mut ConnectionReport,
) -> Result<(), RemoteError> {
    let response = tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        target
            .http
            .get(&target.url)
            .headers(target.headers.clone())
            .header(ACCEPT, "text/event-stream")
            .send(),
    )
    .await
    .map_err(|_| RemoteError::Timeout(HANDSHAKE_TIMEOUT.as_secs()))??;

    if !response.status().is_success() {
        return Err(RemoteError::HttpStatus(response.status().as_u16()));
    }

    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(RemoteError::Network)?;
        for event in decoder.push(&chunk) {
            if event.event == CONNECT_EVENT {
                register(target, &event).await?;
                report.registered_at = Some(Instant::now());
                tracing::info!(topic = %target.topic, "Realtime subscription registered");
                if reconnect.take_missed_events() {
                    tracing::debug!("Previous connection failed, reporting a change");
                    on_change();
                }
            } else if report.registered_at.is_some()
                && is_collection_event(&event, &target.collection)
            {
                tracing::debug!(event = %event.event, "Remote change notification");
                on_change();
            }
        }
    }

    Ok(())
}

/// Register our topic for the client id carried by `PB_CONNECT`.
async fn register(target: &RealtimeTarget, event: &SseEvent) -> Result<(), RemoteError> {
    let payload: ConnectPayload = serde_json::from_str(&event.data)
        .map_err(|e| RemoteError::Realtime(format!("bad PB_CONNECT payload: {}", e)))?;

    let body = serde_json::json!({
        "clientId": payload.client_id,
        "subscriptions": [target.topic],
    });

    let response = tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        target
            .http
            .post(&target.url)
            .headers(target.headers.clone())
            .json(&body)
            .send(),
    )
    .await
    .map_err(|_| RemoteError::Timeout(HANDSHAKE_TIMEOUT.as_secs()))??;

    if !response.status().is_success() {
        return Err(RemoteError::Realtime(format!(
            "subscription rejected with status {}",
            response.status().as_u16()
        )));
    }
    Ok(())
}

/// Record events are named `<collection>/*` or `<collection>/<record id>`.
fn is_collection_event(event: &SseEvent, collection: &str) -> bool {
    event
        .event
        .strip_prefix(collection)
        .is_some_and(|rest| rest.starts_with('/'))
}
