//! Integration tests for queue backpressure with a busy pool.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{collect_terminal, settings, wait_started, FakeCodec, Gate, Pipeline};
use rawdrop::conversion::{BackpressurePolicy, ConversionEvent, RejectReason};
use tokio::sync::broadcast;

/// One worker parked inside the codec and one task filling the buffer.
async fn saturated(policy: BackpressurePolicy) -> (Pipeline, broadcast::Receiver<ConversionEvent>) {
    let p = Pipeline::start_with(settings(1, 1, policy), FakeCodec::with_gate(Gate::closed()));
    let mut events = p.service.subscribe();

    let busy = p.task("busy.nef");
    let busy_id = busy.id();
    p.service.submit(busy).await.unwrap();
    wait_started(&mut events, busy_id).await;

    p.service.submit(p.task("buffered.nef")).await.unwrap();
    assert_eq!(p.service.stats().queue_depth, 1);

    (p, events)
}

#[tokio::test]
async fn reject_policy_refuses_immediately_when_full() {
    let (p, mut events) = saturated(BackpressurePolicy::Reject).await;

    let started = Instant::now();
    let err = p.service.submit(p.task("overflow.nef")).await.unwrap_err();
    assert_eq!(err.reason(), RejectReason::QueueFull);
    assert!(started.elapsed() < Duration::from_millis(50));

    let stats = p.service.stats();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.queue_depth, 1);
    assert_eq!(stats.busy_workers, 1);

    p.codec.gate.open();
    collect_terminal(&mut events, 2).await;
    assert_eq!(p.service.stats().completed, 2);
    assert_eq!(p.codec.calls(), 2);
}

#[tokio::test]
async fn block_policy_times_out_when_full() {
    let (p, mut events) = saturated(BackpressurePolicy::Block).await;

    let started = Instant::now();
    let err = p.service.submit(p.task("overflow.nef")).await.unwrap_err();
    assert_eq!(err.reason(), RejectReason::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(100));

    p.codec.gate.open();
    collect_terminal(&mut events, 2).await;
    assert_eq!(p.service.stats().rejected, 1);
}

#[tokio::test]
async fn block_policy_accepts_once_space_frees() {
    let mut s = settings(1, 1, BackpressurePolicy::Block);
    s.submit_timeout = Duration::from_secs(5);
    let p = Pipeline::start_with(s, FakeCodec::with_gate(Gate::closed()));
    let mut events = p.service.subscribe();

    let busy = p.task("busy.nef");
    let busy_id = busy.id();
    p.service.submit(busy).await.unwrap();
    wait_started(&mut events, busy_id).await;
    p.service.submit(p.task("buffered.nef")).await.unwrap();

    let waiting = {
        let service = Arc::clone(&p.service);
        let task = p.task("waiting.nef");
        tokio::spawn(async move { service.submit(task).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiting.is_finished());

    p.codec.gate.open();
    waiting.await.unwrap().unwrap();
    collect_terminal(&mut events, 3).await;

    let stats = p.service.stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.rejected, 0);
}
