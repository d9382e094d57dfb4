use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the notices of `room`.
///
/// Returns the handshake to send first and the receiver carrying every later event.
pub async fn subscribe(
    state: &SharedState,
    room: &str,
) -> (Option<ServerEvent>, broadcast::Receiver<ServerEvent>) {
    let receiver = state.sse().subscribe();
    let payload = Handshake {
        room: room.to_owned(),
        message: format!("Following room {room}"),
        degraded: state.is_degraded().await,
    };

    let handshake = match ServerEvent::json(EVENT_HANDSHAKE, Some(room.to_owned()), &payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(room, error = %err, "failed to serialize SSE handshake");
            None
        }
    };
    info!(room, subscribers = state.sse().subscriber_count(), "SSE stream connected");
    (handshake, receiver)
}

/// Convert a broadcast receiver into an SSE response carrying the events of `room`.
pub fn to_sse_stream(
    handshake: Option<ServerEvent>,
    mut receiver: broadcast::Receiver<ServerEvent>,
    room: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(handshake) = handshake {
            if tx.send(Ok(to_event(handshake))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) if payload.is_for(&room) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => continue,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(room = %room, skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(room = %room, "SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{audio::fake::FakePlayer, config::AppConfig, state::AppState};

    #[tokio::test]
    async fn handshake_reports_degraded_mode() {
        let state = AppState::new(AppConfig::default(), Arc::new(FakePlayer::new()));
        let (handshake, _receiver) = subscribe(&state, "room").await;

        let handshake = handshake.unwrap();
        assert_eq!(handshake.event.as_deref(), Some("handshake"));
        let data: serde_json::Value = serde_json::from_str(&handshake.data).unwrap();
        assert_eq!(data["room"], "room");
        assert_eq!(data["degraded"], true);
        assert_eq!(state.sse().subscriber_count(), 1);
    }
}
