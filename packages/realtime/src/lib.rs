//! Real-time event fan-out.
//!
//! - [`EventHub`]: registry of live subscribers with non-blocking broadcast
//! - [`SubscriberAdapter`]: bounded queue plus delivery task per connection
//! - [`EventSink`]: SSE and channel transports
//! - [`subscribe`]: the full lifetime of one subscription

mod adapter;
mod hub;
mod sink;

pub use adapter::{DEFAULT_BUFFER, SubscribeError, SubscriberAdapter};
pub use hub::{EventHub, Subscriber, SubscriberId};
pub use sink::{EventSink, SinkError, SseWriter, format_sse_frame, write_event};

use tokio_util::sync::CancellationToken;

/// Serve one subscription until `cancel` fires or the sink fails.
///
/// The `connected` event is written before the subscriber is registered, so
/// it is always the first thing the client sees.
pub async fn subscribe<S: EventSink>(
    hub: &EventHub,
    sink: S,
    cancel: CancellationToken,
    capacity: usize,
) -> Result<(), SubscribeError> {
    let adapter = SubscriberAdapter::open(sink, capacity).await?;
    hub.register(adapter.clone());

    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = adapter.closed() => {}
    }

    hub.unregister(adapter.id());
    adapter.close().await;

    Ok(())
}
