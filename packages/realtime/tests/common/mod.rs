use std::time::Duration;

use futures_util::future::BoxFuture;
use realtime::{EventHub, EventSink, SinkError};
use serde_json::Value;
use tokio::sync::mpsc;

/// A sink whose every write fails.
pub struct BrokenSink;

impl EventSink for BrokenSink {
    fn write_json(&mut self, _json: String) -> BoxFuture<'_, Result<(), SinkError>> {
        Box::pin(async { Err(SinkError::Closed) })
    }
}

/// Accepts the first write, then hangs on every later one.
pub struct StallingSink {
    pub writes: usize,
}

impl EventSink for StallingSink {
    fn write_json(&mut self, _json: String) -> BoxFuture<'_, Result<(), SinkError>> {
        self.writes += 1;
        let first = self.writes == 1;
        Box::pin(async move {
            if !first {
                std::future::pending::<()>().await;
            }
            Ok(())
        })
    }
}

/// Wait until the hub reports `expected` clients.
pub async fn wait_for_clients(hub: &EventHub, expected: usize) {
    for _ in 0..200 {
        if hub.client_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected {expected} clients, hub has {}",
        hub.client_count()
    );
}

/// Receive the next frame and parse it.
pub async fn next_json(rx: &mut mpsc::Receiver<String>) -> Option<Value> {
    let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()??;
    serde_json::from_str(&frame).ok()
}
