//! Real-time event streaming.
//!
//! Transports hand an [`EventSink`] to [`Sampler::subscribe`]; the call
//! returns once the client goes away or `cancel` fires.

use realtime::{EventSink, SubscribeError};
use sampler_core::HubEvent;
use tokio_util::sync::CancellationToken;

use crate::init::Sampler;

impl Sampler {
    /// Stream hub events to `sink` until `cancel` fires or the sink fails.
    pub async fn subscribe<S: EventSink>(
        &self,
        sink: S,
        cancel: CancellationToken,
    ) -> Result<(), SubscribeError> {
        tracing::debug!(clients = self.hub.client_count(), "Subscriber connecting");
        realtime::subscribe(&self.hub, sink, cancel, self.subscriber_buffer).await
    }

    /// Announce a newly rendered image.
    pub fn publish_image_added(&self, path: impl Into<String>) -> usize {
        self.hub.broadcast(&HubEvent::ImageAdded { path: path.into() })
    }

    /// Announce a newly discovered training-run directory.
    pub fn publish_directory_added(&self, path: impl Into<String>) -> usize {
        self.hub
            .broadcast(&HubEvent::DirectoryAdded { path: path.into() })
    }

    /// Number of connected subscribers.
    pub fn client_count(&self) -> usize {
        self.hub.client_count()
    }
}
