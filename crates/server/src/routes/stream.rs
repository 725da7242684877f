// crates/server/src/routes/stream.rs
//! Push stream of live status and completed transfers.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use ingest_monitor_types::StreamEvent;

use crate::hub::{Subscription, SubscriptionGuard};
use crate::state::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /api/stream - SSE stream of [`StreamEvent`]s.
///
/// Events are unnamed; each `data` field is the JSON event
/// (`{"type":"status",...}` or `{"type":"update",...}`). The first message
/// is the latest status snapshot so a client can render immediately. A client that
/// falls behind is dropped by the hub and its stream ends; clients are
/// expected to reconnect.
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let monitor = state.monitor.clone();
    let Subscription { id, mut rx } = monitor.hub.subscribe();
    let guard = SubscriptionGuard::new(id, monitor.hub.clone());
    tracing::debug!(subscriber_id = id, "Stream client connected");

    let stream = async_stream::stream! {
        let _guard = guard;

        yield Ok(sse_event(&StreamEvent::status(monitor.latest_status())));

        while let Some(event) = rx.recv().await {
            yield Ok(sse_event(&event));
        }

        tracing::debug!(subscriber_id = id, "Stream closed by hub");
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

fn sse_event(event: &StreamEvent) -> Event {
    Event::default().data(serde_json::to_string(event).unwrap_or_default())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/stream", get(event_stream))
}
