// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::time::Duration;

use futures::StreamExt;
use tracing_test::traced_test;
use wiremock::MockServer;
use wiremock::matchers::body_string_contains;

use xenapi::{Event, EventOperation, EventStream};
use xenapi_wire::Value;

use common::*;

fn vm_event() -> Value {
    Value::structure([
        ("id", Value::from("17")),
        ("timestamp", Value::from("20250615T08:00:00Z")),
        ("class", Value::from("VM")),
        ("operation", Value::from("add")),
        ("ref", Value::from("OpaqueRef:v")),
        (
            "snapshot",
            Value::structure([
                ("uuid", Value::from("v-uuid")),
                ("name_label", Value::from("web-01")),
            ]),
        ),
    ])
}

fn batch(events: Vec<Value>, token: &str) -> Value {
    Value::structure([
        ("events", Value::Array(events)),
        ("valid_ref_counts", Value::Struct(Default::default())),
        ("token", Value::from(token)),
    ])
}

async fn event_from_server() -> MockServer {
    let server = MockServer::start().await;
    call("event.from")
        .and(body_string_contains("<string></string>"))
        .respond_with(reply(success(batch(vec![vm_event()], "17"))))
        .mount(&server)
        .await;
    call("event.from")
        .and(body_string_contains("<string>17</string>"))
        .respond_with(reply(success(batch(Vec::new(), "17"))))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_event_window() {
    let server = event_from_server().await;
    let session = logged_in(&server, config(&server)).await;

    let mut events = EventStream::new(&session, ["VM"], Duration::from_secs(5));
    assert_eq!(events.token(), "");

    let first = events.next().await.unwrap().unwrap();
    assert_eq!(first.token, "17");
    assert_eq!(first.events.len(), 1);
    let event = &first.events[0];
    assert_eq!(event.class, "VM");
    assert_eq!(event.operation, EventOperation::Add);
    assert_eq!(event.reference, "OpaqueRef:v");
    assert_eq!(
        event.snapshot.as_ref().and_then(|s| s.get("name_label")),
        Some(&Value::from("web-01"))
    );
    assert_eq!(events.token(), "17");

    let second = events.next().await.unwrap().unwrap();
    assert!(second.events.is_empty());
    assert_eq!(second.token, "17");
    assert!(!events.is_legacy());

    let calls = received_calls(&server).await;
    let from = &calls[1];
    assert_eq!(from.method, "event.from");
    assert_eq!(
        from.params[1..],
        [
            Value::Array(vec![Value::from("VM")]),
            Value::from(""),
            Value::Double(5.0),
        ]
    );
    assert_eq!(calls[2].params[2], Value::from("17"));

    events.close().await.unwrap();
    assert!(events.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_event_stream_adapter() {
    let server = event_from_server().await;
    let session = logged_in(&server, config(&server)).await;

    let batches: Vec<_> = EventStream::new(&session, ["VM"], Duration::from_secs(5))
        .into_stream()
        .take(2)
        .collect()
        .await;
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].as_ref().unwrap().events.len(), 1);
    assert!(batches[1].as_ref().unwrap().events.is_empty());
}

#[tokio::test]
async fn test_resume_from_token() {
    let server = event_from_server().await;
    let session = logged_in(&server, config(&server)).await;

    let mut events = EventStream::new(&session, ["VM"], Duration::from_secs(5)).with_token("17");
    let batch = events.next().await.unwrap().unwrap();
    assert!(batch.events.is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_legacy_fallback() {
    let server = MockServer::start().await;
    respond(
        &server,
        "event.from",
        fault(&["MESSAGE_METHOD_UNKNOWN", "event.from"]),
    )
    .await;
    call("event.register")
        .respond_with(reply(success(Value::from(""))))
        .expect(1)
        .mount(&server)
        .await;
    respond(
        &server,
        "event.next",
        success(Value::Array(vec![Value::structure([
            ("id", Value::from(42)),
            ("timestamp", Value::from("20250615T08:00:00Z")),
            ("class", Value::from("VM")),
            ("operation", Value::from("mod")),
            ("ref", Value::from("OpaqueRef:v")),
            ("obj_uuid", Value::from("v-uuid")),
        ])])),
    )
    .await;
    call("event.unregister")
        .respond_with(reply(success(Value::from(""))))
        .expect(1)
        .mount(&server)
        .await;
    let session = logged_in(&server, config(&server)).await;

    let mut events = EventStream::new(&session, ["*"], Duration::from_secs(5));
    let batch = events.next().await.unwrap().unwrap();
    assert!(events.is_legacy());
    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.events[0].operation, EventOperation::Mod);
    assert_eq!(batch.events[0].obj_uuid, "v-uuid");
    assert_eq!(batch.token, "42");
    assert!(logs_contain("falling back to event.register and event.next"));

    // registration happens once
    events.next().await.unwrap().unwrap();
    events.close().await.unwrap();

    let methods = received_methods(&server).await;
    assert_eq!(
        methods.iter().filter(|m| *m == "event.from").count(),
        1
    );
}

#[tokio::test]
async fn test_other_event_messages() {
    let server = MockServer::start().await;
    respond(&server, "event.get_current_id", success(Value::from("1234"))).await;
    respond(&server, "event.inject", success(Value::from("18"))).await;
    let session = logged_in(&server, config(&server)).await;

    assert_eq!(Event::get_current_id(&session).await.unwrap(), 1234);
    let token = Event::inject(&session, "VM", "OpaqueRef:v").await.unwrap();
    assert_eq!(token, "18");

    let calls = received_calls(&server).await;
    assert_eq!(
        calls.last().unwrap().params[1..],
        [Value::from("VM"), Value::from("OpaqueRef:v")]
    );
}
