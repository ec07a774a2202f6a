// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mvm_core::test_support::{completed_event, failed_event};
use std::future::pending;

#[tokio::test]
async fn wait_next_returns_an_emitted_event() {
    let bus = EventBus::new();
    bus.emit(completed_event("t1"));

    match bus.wait_next(1_000, pending()).await {
        WaitOutcome::Event(event) => assert_eq!(event.task_id().as_str(), "t1"),
        other => panic!("expected Event, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_next_delivers_events_in_fifo_order() {
    let bus = EventBus::new();
    bus.emit(completed_event("first"));
    bus.emit(failed_event("second", "boom"));

    let WaitOutcome::Event(first) = bus.wait_next(1_000, pending()).await else {
        panic!("expected first event");
    };
    let WaitOutcome::Event(second) = bus.wait_next(1_000, pending()).await else {
        panic!("expected second event");
    };
    assert_eq!(first.task_id().as_str(), "first");
    assert_eq!(second.task_id().as_str(), "second");
}

#[tokio::test]
async fn wait_next_times_out_when_nothing_is_emitted() {
    let bus = EventBus::new();
    match bus.wait_next(20, pending()).await {
        WaitOutcome::Timeout => {}
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_next_surfaces_cancellation_distinctly_from_timeout() {
    let bus = EventBus::new();
    let cancel = async { /* resolves immediately */ };
    match bus.wait_next(5_000, cancel).await {
        WaitOutcome::Cancelled => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_waiters_each_receive_a_distinct_event() {
    let bus = EventBus::new();
    let bus2 = bus.clone();

    let waiter_a = tokio::spawn(async move { bus2.wait_next(2_000, pending()).await });
    // Give waiter_a a chance to start waiting before both events land.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    bus.emit(completed_event("a"));
    bus.emit(completed_event("b"));

    let first = waiter_a.await.unwrap();
    let second = bus.wait_next(2_000, pending()).await;

    let ids: Vec<String> = [first, second]
        .into_iter()
        .map(|outcome| match outcome {
            WaitOutcome::Event(event) => event.task_id().as_str().to_string(),
            other => panic!("expected Event, got {other:?}"),
        })
        .collect();
    assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
}
