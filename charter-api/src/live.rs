use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use charter_core::Subscription;
use charter_shared::DomainEvent;
use futures_util::stream::Stream;
use tokio_stream::StreamExt;

fn to_sse(event: &DomainEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(event.name()).data(json)
}

/// Stream a subscription as server-sent events. The stream ends, and the
/// subscription is dropped, when the client disconnects.
pub fn sse_from(subscription: Subscription) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("SSE subscriber attached to {}", subscription.topic().key());
    let stream = subscription
        .into_stream()
        .map(|event| Ok::<_, Infallible>(to_sse(&event)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
