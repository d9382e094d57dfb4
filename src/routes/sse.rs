use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/rooms/{room}",
    tag = "sse",
    params(("room" = String, Path, description = "Room to follow")),
    responses((status = 200, description = "Room notices", content_type = "text/event-stream", body = String))
)]
/// Stream the notices of one room to a renderer.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(room): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (handshake, receiver) = sse_service::subscribe(&state, &room).await;
    sse_service::to_sse_stream(handshake, receiver, room)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/rooms/{room}", get(room_stream))
}
