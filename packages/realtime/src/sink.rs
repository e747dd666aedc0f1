//! Outbound transports a subscription can write to.

use futures_util::future::BoxFuture;
use sampler_core::HubEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("connection closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One live outbound connection.
///
/// Receives each event already serialized as a single JSON document.
pub trait EventSink: Send + 'static {
    fn write_json(&mut self, json: String) -> BoxFuture<'_, Result<(), SinkError>>;
}

/// Serialize and write one event.
pub async fn write_event<S: EventSink + ?Sized>(
    sink: &mut S,
    event: &HubEvent,
) -> Result<(), SinkError> {
    let json = serde_json::to_string(event)?;
    sink.write_json(json).await
}

/// Frame a JSON payload as one Server-Sent Events message.
pub fn format_sse_frame(json: &str) -> String {
    format!("data: {}\n\n", json)
}

/// Server-Sent Events framing over any byte stream.
pub struct SseWriter<W> {
    inner: W,
}

impl<W> SseWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W> EventSink for SseWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn write_json(&mut self, json: String) -> BoxFuture<'_, Result<(), SinkError>> {
        Box::pin(async move {
            let frame = format_sse_frame(&json);
            self.inner.write_all(frame.as_bytes()).await?;
            // Each event must reach the client on its own.
            self.inner.flush().await?;
            Ok(())
        })
    }
}

/// Hand events to another task, e.g. a WebSocket writer.
impl EventSink for mpsc::Sender<String> {
    fn write_json(&mut self, json: String) -> BoxFuture<'_, Result<(), SinkError>> {
        Box::pin(async move { self.send(json).await.map_err(|_| SinkError::Closed) })
    }
}
