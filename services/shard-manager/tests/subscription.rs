//! Integration tests for the subscription pump's reconnect behavior.


use std::sync::atomic::Ordering;
use std::time::Duration;

use harness::{notification, ScriptedSubscriber, Session};
use tokio::sync::{mpsc, watch};
use upsf_shard_manager::backoff::BackoffPolicy;
use upsf_shard_manager::{ItemKind, StoreError, SubscriptionPump, Trigger};

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        base: Duration::from_millis(1),
        max: Duration::from_millis(5),
        jitter: 0.0,
    }
}

async fn next_trigger(rx: &mut mpsc::Receiver<Trigger>) -> Trigger {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no trigger received")
        .expect("trigger queue closed")
}

#[tokio::test]
async fn test_forwards_notifications_and_resyncs_after_reconnect() {
    let source = ScriptedSubscriber::new(vec![
        Session::Finite(vec![
            Ok(notification(ItemKind::UserPlane, "up-a")),
            Ok(notification(ItemKind::Shard, "s1")),
        ]),
        Session::Open(vec![Ok(notification(ItemKind::NetworkConnection, "nc-1"))]),
    ]);
    let (tx, mut rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = SubscriptionPump::new(source.clone(), tx, fast_backoff());
    let handle = tokio::spawn(async move { pump.run(shutdown_rx).await });

    assert_eq!(
        next_trigger(&mut rx).await,
        Trigger::Notification(notification(ItemKind::UserPlane, "up-a"))
    );
    assert_eq!(
        next_trigger(&mut rx).await,
        Trigger::Notification(notification(ItemKind::Shard, "s1"))
    );
    assert_eq!(next_trigger(&mut rx).await, Trigger::Resync);
    assert_eq!(
        next_trigger(&mut rx).await,
        Trigger::Notification(notification(ItemKind::NetworkConnection, "nc-1"))
    );
    assert_eq!(source.attempts.load(Ordering::SeqCst), 2);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pump did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_refused_subscription_is_retried() {
    let source = ScriptedSubscriber::new(vec![
        Session::Refused,
        Session::Refused,
        Session::Open(vec![Ok(notification(ItemKind::Shard, "s1"))]),
    ]);
    let (tx, mut rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = SubscriptionPump::new(source.clone(), tx, fast_backoff());
    let handle = tokio::spawn(async move { pump.run(shutdown_rx).await });

    assert_eq!(next_trigger(&mut rx).await, Trigger::Resync);
    assert_eq!(
        next_trigger(&mut rx).await,
        Trigger::Notification(notification(ItemKind::Shard, "s1"))
    );
    assert_eq!(source.attempts.load(Ordering::SeqCst), 3);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pump did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_stream_error_interrupts_subscription() {
    let source = ScriptedSubscriber::new(vec![Session::Open(vec![
        Ok(notification(ItemKind::Shard, "s1")),
        Err(StoreError::Decode("item without kind".to_string())),
        Ok(notification(ItemKind::Shard, "never-delivered")),
    ])]);
    let (tx, mut rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = SubscriptionPump::new(source.clone(), tx, fast_backoff());
    let handle = tokio::spawn(async move { pump.run(shutdown_rx).await });

    assert_eq!(
        next_trigger(&mut rx).await,
        Trigger::Notification(notification(ItemKind::Shard, "s1"))
    );
    assert_eq!(next_trigger(&mut rx).await, Trigger::Resync);
    assert_eq!(source.attempts.load(Ordering::SeqCst), 2);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pump did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_pump_stops_when_queue_is_dropped() {
    let source = ScriptedSubscriber::new(vec![Session::Open(vec![Ok(notification(
        ItemKind::Shard,
        "s1",
    ))])]);
    let (tx, rx) = mpsc::channel(16);
    drop(rx);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = SubscriptionPump::new(source, tx, fast_backoff());

    tokio::time::timeout(Duration::from_secs(5), pump.run(shutdown_rx))
        .await
        .expect("pump did not stop");
}

#[tokio::test]
async fn test_shutdown_while_idle() {
    let source = ScriptedSubscriber::new(vec![]);
    let (tx, _rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = SubscriptionPump::new(source, tx, fast_backoff());
    let handle = tokio::spawn(async move { pump.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pump did not stop")
        .unwrap();
}
