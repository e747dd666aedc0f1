#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use realtime::{EventHub, SubscribeError, Subscriber, SubscriberAdapter, subscribe};
use sampler_core::HubEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn image(path: &str) -> HubEvent {
    HubEvent::ImageAdded {
        path: path.to_string(),
    }
}

#[tokio::test]
async fn test_connected_is_first_then_broadcasts_flow() -> Result<(), Box<dyn Error>> {
    let hub = Arc::new(EventHub::new());
    let (tx, mut rx) = mpsc::channel::<String>(16);
    let cancel = CancellationToken::new();

    let task = tokio::spawn({
        let hub = hub.clone();
        let cancel = cancel.clone();
        async move { subscribe(&hub, tx, cancel, 8).await }
    });

    let first = common::next_json(&mut rx).await.ok_or("no connected event")?;
    assert_eq!(first["type"], "connected");

    common::wait_for_clients(&hub, 1).await;
    assert_eq!(hub.broadcast(&image("run/a/1.png")), 1);

    let second = common::next_json(&mut rx).await.ok_or("no image event")?;
    assert_eq!(second["type"], "image_added");
    assert_eq!(second["path"], "run/a/1.png");

    cancel.cancel();
    task.await??;
    assert_eq!(hub.client_count(), 0);

    // The delivery task is gone and the sink was dropped with it.
    assert!(rx.recv().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_failed_connected_write_never_registers() {
    let hub = EventHub::new();
    let result = subscribe(&hub, common::BrokenSink, CancellationToken::new(), 8).await;

    assert!(matches!(result, Err(SubscribeError::Handshake(_))));
    assert_eq!(hub.client_count(), 0);
}

#[tokio::test]
async fn test_two_subscribers_then_one_leaves() -> Result<(), Box<dyn Error>> {
    let hub = Arc::new(EventHub::new());

    let (tx_a, mut rx_a) = mpsc::channel::<String>(16);
    let (tx_b, mut rx_b) = mpsc::channel::<String>(16);
    let cancel_a = CancellationToken::new();
    let cancel_b = CancellationToken::new();

    let task_a = tokio::spawn({
        let (hub, cancel) = (hub.clone(), cancel_a.clone());
        async move { subscribe(&hub, tx_a, cancel, 8).await }
    });
    let task_b = tokio::spawn({
        let (hub, cancel) = (hub.clone(), cancel_b.clone());
        async move { subscribe(&hub, tx_b, cancel, 8).await }
    });

    assert_eq!(common::next_json(&mut rx_a).await.ok_or("a")?["type"], "connected");
    assert_eq!(common::next_json(&mut rx_b).await.ok_or("b")?["type"], "connected");
    common::wait_for_clients(&hub, 2).await;

    assert_eq!(hub.broadcast(&image("one.png")), 2);
    assert_eq!(common::next_json(&mut rx_a).await.ok_or("a")?["path"], "one.png");
    assert_eq!(common::next_json(&mut rx_b).await.ok_or("b")?["path"], "one.png");

    cancel_a.cancel();
    task_a.await??;
    assert_eq!(hub.client_count(), 1);

    assert_eq!(hub.broadcast(&image("two.png")), 1);
    assert_eq!(common::next_json(&mut rx_b).await.ok_or("b")?["path"], "two.png");
    assert!(rx_a.recv().await.is_none());

    cancel_b.cancel();
    task_b.await??;
    assert_eq!(hub.client_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_stalled_sink_drops_instead_of_blocking() -> Result<(), Box<dyn Error>> {
    let hub = EventHub::new();
    let adapter = SubscriberAdapter::open(common::StallingSink { writes: 0 }, 2).await?;
    hub.register(adapter.clone());

    // At most one event in the stuck write plus two buffered.
    let accepted = (0..10)
        .map(|i| hub.broadcast(&image(&format!("{i}.png"))))
        .sum::<usize>();
    assert!((2..=3).contains(&accepted), "accepted {accepted}");

    // Closing interrupts the stuck write.
    tokio::time::timeout(Duration::from_secs(2), adapter.close()).await?;
    assert!(adapter.is_closed());
    assert!(!adapter.send_event(&image("late.png")));

    hub.unregister(adapter.id());
    Ok(())
}

#[tokio::test]
async fn test_sink_failure_ends_subscription() -> Result<(), Box<dyn Error>> {
    let hub = Arc::new(EventHub::new());
    let (tx, mut rx) = mpsc::channel::<String>(16);

    let task = tokio::spawn({
        let hub = hub.clone();
        async move { subscribe(&hub, tx, CancellationToken::new(), 8).await }
    });

    assert_eq!(common::next_json(&mut rx).await.ok_or("connected")?["type"], "connected");
    common::wait_for_clients(&hub, 1).await;

    // Client goes away; the next write fails and the subscription unwinds.
    drop(rx);
    hub.broadcast(&image("gone.png"));

    tokio::time::timeout(Duration::from_secs(2), task).await???;
    assert_eq!(hub.client_count(), 0);
    Ok(())
}
