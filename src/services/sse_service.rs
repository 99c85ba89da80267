//! SSE plumbing: bridging the store's change feed onto per-session hubs and
//! serving hub subscriptions as event streams.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{session::SessionView, sse::ServerEvent},
    error::ServiceError,
    state::SharedState,
};

/// Buffered events per connected SSE client.
const CLIENT_BUFFER: usize = 16;
/// Keep-alive comment interval, keeps proxies from cutting idle streams.
const KEEP_ALIVE_SECS: u64 = 15;

/// Bridge one session's committed snapshots onto its SSE hub.
///
/// Spawned once per session at creation time. Every commit becomes a
/// `session` event carrying the redacted view, in commit order; the task ends
/// when the store drops the session's feed.
pub fn spawn_session_feed(state: SharedState, session_id: Uuid) {
    tokio::spawn(async move {
        let mut feed = match state.store().subscribe(session_id).await {
            Ok(feed) => feed,
            Err(err) => {
                warn!(session = %session_id, error = %err, "could not subscribe to session feed");
                return;
            }
        };
        loop {
            match feed.recv().await {
                Ok(snapshot) => {
                    let view = SessionView::from(&snapshot);
                    match ServerEvent::json("session".to_string(), &view) {
                        Ok(event) => state.session_hub(session_id).broadcast(event),
                        Err(err) => {
                            warn!(session = %session_id, error = %err, "could not serialize session event");
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(session = %session_id, skipped, "session feed bridge lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Open an SSE stream for one session.
///
/// The stream starts with a snapshot of the session as it is right now, then
/// carries every event the hub broadcasts. A subscriber that cannot keep up
/// misses intermediate events but always ends on a fresh snapshot, because
/// snapshots carry the whole document rather than deltas.
pub async fn session_stream(
    state: &SharedState,
    session_id: Uuid,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, ServiceError> {
    let snapshot = state
        .store()
        .read(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;

    let mut events = state.session_hub(session_id).subscribe();
    let (sender, receiver) = mpsc::channel::<Result<Event, Infallible>>(CLIENT_BUFFER);

    if let Ok(initial) = ServerEvent::json("session".to_string(), &SessionView::from(&snapshot)) {
        let _ = sender.send(Ok(to_sse_event(initial))).await;
    }

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if sender.send(Ok(to_sse_event(event))).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(session = %session_id, skipped, "sse subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    Ok(Sse::new(ReceiverStream::new(receiver))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS))))
}

fn to_sse_event(event: ServerEvent) -> Event {
    let mut sse = Event::default().data(event.data);
    if let Some(name) = event.event {
        sse = sse.event(name);
    }
    sse
}
