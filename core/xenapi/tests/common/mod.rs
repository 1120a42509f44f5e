// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::time::Duration;

use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

use xenapi::{BackoffConfig, ClientConfig, DecodeMode, Session, TaskPollConfig};
use xenapi_wire::codec::{self, MethodCall, MethodResponse};
use xenapi_wire::{Fault, Value};

pub const SESSION: &str = "OpaqueRef:abc";

/// A successful response carrying `value`.
pub fn success(value: Value) -> String {
    codec::encode_response(&MethodResponse::Success(value))
}

/// A fault whose string is the JSON error description.
pub fn fault(description: &[&str]) -> String {
    let message = format!(
        "[{}]",
        description
            .iter()
            .map(|s| format!("{s:?}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    codec::encode_response(&MethodResponse::Fault(Fault { code: 1, message }))
}

/// Matches a call of `name`.
pub fn call(name: &str) -> MockBuilder {
    Mock::given(method("POST")).and(body_string_contains(format!(
        "<methodName>{name}</methodName>"
    )))
}

pub fn reply(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/xml")
        .set_body_string(body)
}

/// Answers every call of `name` with `body`.
pub async fn respond(server: &MockServer, name: &str, body: String) {
    call(name).respond_with(reply(body)).mount(server).await;
}

/// Answers the next `times` calls of `name` with `body`.
pub async fn respond_times(server: &MockServer, name: &str, times: u64, body: String) {
    call(name)
        .respond_with(reply(body))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

pub fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::with_endpoint(&server.uri())
        .with_credentials("alice", "s3cret")
        .with_request_timeout(Duration::from_secs(5))
        .with_backoff(BackoffConfig::new_fixed_interval(Duration::from_millis(10)))
        .with_task_poll(TaskPollConfig::new(
            Duration::from_millis(10),
            Duration::from_millis(40),
            2,
        ))
        .with_decode_mode(DecodeMode::Lenient)
}

/// A session logged in as `alice`, with reference [`SESSION`].
pub async fn logged_in(server: &MockServer, config: ClientConfig) -> Session {
    respond(
        server,
        "session.login_with_password",
        success(Value::from(SESSION)),
    )
    .await;
    let session = Session::new(config).unwrap();
    session.login().await.unwrap();
    session
}

/// The calls the server received, decoded.
pub async fn received_calls(server: &MockServer) -> Vec<MethodCall> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| {
            let body = String::from_utf8(request.body.clone()).unwrap();
            codec::decode_call(&body).unwrap()
        })
        .collect()
}

/// Names of the calls the server received, in order.
pub async fn received_methods(server: &MockServer) -> Vec<String> {
    received_calls(server)
        .await
        .into_iter()
        .map(|call| call.method)
        .collect()
}
