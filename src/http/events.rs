//! Server-sent event stream of queue broadcasts
//!
//! Every connected observer gets every event; clients filter by company
//! code or ticket themselves. Observers that fall behind the broadcast
//! buffer skip the missed events and keep streaming.

use crate::http::ApiState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

pub async fn event_stream(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.notifier.subscribe();
    debug!(
        "Observer connected to event stream ({} active)",
        state.notifier.observer_count()
    );

    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(event) => match Event::default().json_data(&event) {
            Ok(sse_event) => Some(Ok::<_, Infallible>(sse_event)),
            Err(e) => {
                debug!("Failed to serialize broadcast event: {}", e);
                None
            }
        },
        Err(lag) => {
            debug!("Observer lagged behind the broadcast buffer: {}", lag);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
