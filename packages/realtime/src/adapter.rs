//! Per-connection bridge between the hub and one outbound sink.

use std::sync::Arc;

use sampler_core::HubEvent;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::{Subscriber, SubscriberId};
use crate::sink::{EventSink, SinkError, write_event};

/// Buffer size used when the caller does not pick one.
pub const DEFAULT_BUFFER: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("failed to write the connected event: {0}")]
    Handshake(#[source] SinkError),
}

/// A subscriber that forwards events to its sink from a dedicated task.
///
/// The hub only ever touches the bounded queue, so a slow connection delays
/// nobody but itself.
pub struct SubscriberAdapter {
    id: SubscriberId,
    tx: mpsc::Sender<HubEvent>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriberAdapter {
    /// Write the `connected` event, then start the delivery loop.
    ///
    /// Fails without spawning anything if the first write fails.
    pub async fn open<S: EventSink>(
        mut sink: S,
        capacity: usize,
    ) -> Result<Arc<Self>, SubscribeError> {
        write_event(&mut sink, &HubEvent::Connected)
            .await
            .map_err(SubscribeError::Handshake)?;

        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(deliver(id, sink, rx, cancel.clone()));

        Ok(Arc::new(Self {
            id,
            tx,
            cancel,
            task: Mutex::new(Some(task)),
        }))
    }

    /// Resolves once the adapter stopped, either through [`close`](Self::close)
    /// or because its sink failed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the delivery loop and wait for it to exit.
    ///
    /// Nothing is written to the sink after this returns. Calling it again is
    /// a no-op.
    pub async fn close(&self) {
        self.cancel.cancel();

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
            && e.is_panic()
        {
            tracing::warn!(subscriber = %self.id, "Delivery task panicked");
        }
    }
}

impl Subscriber for SubscriberAdapter {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn send_event(&self, event: &HubEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.try_send(event.clone()).is_ok()
    }
}

async fn deliver<S: EventSink>(
    id: SubscriberId,
    mut sink: S,
    mut rx: mpsc::Receiver<HubEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = write_event(&mut sink, &event) => result,
        };

        if let Err(e) = written {
            tracing::debug!(subscriber = %id, error = %e, "Sink failed, stopping delivery");
            cancel.cancel();
            break;
        }
    }
}
