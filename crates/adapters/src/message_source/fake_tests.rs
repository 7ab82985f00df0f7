// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use stepwise_core::MessageKind;

#[tokio::test]
async fn fake_source_yields_messages_in_order_then_closes() {
    let m1 = Message::new(MessageKind::Assistant, "s1", "first");
    let m2 = Message::new(MessageKind::Assistant, "s1", "second");
    let mut source = FakeMessageSource::new(vec![m1, m2]);

    let first = source.next_message().await.unwrap().unwrap();
    assert_eq!(first.content, "first");
    let second = source.next_message().await.unwrap().unwrap();
    assert_eq!(second.content, "second");
    assert!(source.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn fake_source_can_be_pushed_to_after_construction() {
    let mut source = FakeMessageSource::new(Vec::new());
    assert!(source.next_message().await.unwrap().is_none());
    source.push(Message::new(MessageKind::Assistant, "s1", "late arrival"));
    assert_eq!(source.remaining(), 1);
    let message = source.next_message().await.unwrap().unwrap();
    assert_eq!(message.content, "late arrival");
}

#[tokio::test]
async fn fake_source_closes_with_error_after_queue_drains() {
    let m1 = Message::new(MessageKind::Assistant, "s1", "only");
    let mut source = FakeMessageSource::new(vec![m1]).closing_with_error("process exited");
    assert!(source.next_message().await.unwrap().is_some());
    let err = source.next_message().await.unwrap_err();
    assert!(matches!(err, MessageSourceError::Closed(reason) if reason == "process exited"));
}
