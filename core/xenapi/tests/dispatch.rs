// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tracing_test::traced_test;
use wiremock::{MockServer, ResponseTemplate};

use xenapi::{
    ApiError, ApiVersion, Bond, BondMode, BondRef, ClientConfig, Error, NetworkRef, Pif, PifRef,
    Pool, PoolRef, Reference, Session, SessionRef, SessionState, TransportErrorKind, Vdi, VdiRef,
    VdiType, VmMetrics, VmMetricsRef,
};
use xenapi_wire::codec;
use xenapi_wire::{CodecError, Value};

use common::*;

async fn boston_session(server: &MockServer) -> Session {
    respond(server, "pool.get_all", success(Value::Array(vec![Value::from("OpaqueRef:pool")]))).await;
    respond(server, "pool.get_master", success(Value::from("OpaqueRef:host"))).await;
    respond(server, "host.get_API_version_major", success(Value::from("1"))).await;
    respond(server, "host.get_API_version_minor", success(Value::from("9"))).await;
    respond(
        server,
        "host.get_software_version",
        success(Value::structure([("xapi", Value::from("1.3"))])),
    )
    .await;
    logged_in(server, config(server).with_discover_version(true)).await
}

#[tokio::test]
async fn test_typed_fault() {
    let server = MockServer::start().await;
    respond(
        &server,
        "PIF.plug",
        fault(&["TRANSPORT_PIF_NOT_CONFIGURED", "OpaqueRef:p"]),
    )
    .await;
    let session = logged_in(&server, config(&server)).await;

    let err = Pif::plug(&session, &PifRef::new("OpaqueRef:p"))
        .await
        .unwrap_err();
    match err {
        Error::Api(failure) => {
            assert_eq!(failure.code, "TRANSPORT_PIF_NOT_CONFIGURED");
            assert_eq!(failure.params, vec!["OpaqueRef:p"]);
            assert_eq!(
                failure.error,
                ApiError::TransportPifNotConfigured {
                    pif: "OpaqueRef:p".to_string()
                }
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_fault_code_is_kept() {
    let server = MockServer::start().await;
    respond(&server, "PIF.plug", fault(&["NEW_IN_A_LATER_RELEASE", "a", "b"])).await;
    let session = logged_in(&server, config(&server)).await;

    let err = Pif::plug(&session, &PifRef::new("OpaqueRef:p"))
        .await
        .unwrap_err();
    match err {
        Error::Api(failure) => {
            assert_eq!(failure.code, "NEW_IN_A_LATER_RELEASE");
            assert_eq!(failure.params, vec!["a", "b"]);
            assert!(matches!(failure.error, ApiError::Other { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_argument_order() {
    let server = MockServer::start().await;
    respond(&server, "Bond.create", success(Value::from("OpaqueRef:b"))).await;
    let session = logged_in(&server, config(&server)).await;

    let bond = Bond::create(
        &session,
        &NetworkRef::new("OpaqueRef:n"),
        &[PifRef::new("OpaqueRef:p1"), PifRef::new("OpaqueRef:p2")],
        "",
        BondMode::Lacp,
        &HashMap::new(),
    )
    .await
    .unwrap();
    assert_eq!(bond, BondRef::new("OpaqueRef:b"));

    let calls = received_calls(&server).await;
    let create = calls.last().unwrap();
    assert_eq!(create.method, "Bond.create");
    assert_eq!(
        create.params,
        vec![
            Value::from(SESSION),
            Value::from("OpaqueRef:n"),
            Value::Array(vec![
                Value::from("OpaqueRef:p1"),
                Value::from("OpaqueRef:p2"),
            ]),
            Value::from(""),
            Value::from("lacp"),
            Value::Struct(Default::default()),
        ]
    );
}

#[tokio::test]
#[traced_test]
async fn test_older_server_gets_older_arity() {
    let server = MockServer::start().await;
    respond(&server, "Bond.create", success(Value::from("OpaqueRef:b"))).await;
    let session = boston_session(&server).await;
    assert_eq!(session.api_version(), ApiVersion::Boston);

    let properties = HashMap::from([("hashing_algorithm".to_string(), "src_mac".to_string())]);
    Bond::create(
        &session,
        &NetworkRef::new("OpaqueRef:n"),
        &[PifRef::new("OpaqueRef:p1")],
        "",
        BondMode::ActiveBackup,
        &properties,
    )
    .await
    .unwrap();

    let calls = received_calls(&server).await;
    let create = calls.last().unwrap();
    // session, network, members, MAC, mode
    assert_eq!(create.params.len(), 5);
    assert_eq!(create.params[4], Value::from("active-backup"));
    assert!(logs_contain("calling an older arity"));
}

#[tokio::test]
async fn test_null_reference_is_rejected_before_sending() {
    let server = MockServer::start().await;
    let session = logged_in(&server, config(&server)).await;
    let sent = session.call_count();

    let err = Pif::plug(&session, &PifRef::null()).await.unwrap_err();
    match err {
        Error::Codec(e @ CodecError::NullReference { .. }) => {
            assert_eq!(e.site(), Some("PIF.plug(self)"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.call_count(), sent);
    assert_eq!(received_methods(&server).await.len(), 1);
}

#[tokio::test]
async fn test_enum_labels() {
    assert_eq!(BondMode::Lacp.as_str(), "lacp");
    assert_eq!("lacp".parse::<BondMode>(), Ok(BondMode::Lacp));
    assert!("lacp-fast".parse::<BondMode>().is_err());

    let server = MockServer::start().await;
    respond(&server, "Bond.get_mode", success(Value::from("lacp-fast"))).await;
    let session = logged_in(&server, config(&server)).await;

    let err = Bond::get_mode(&session, &BondRef::new("OpaqueRef:b"))
        .await
        .unwrap_err();
    match err {
        Error::Codec(CodecError::UnknownEnumLabel { site, label, .. }) => {
            assert_eq!(site, "Bond.get_mode -> ");
            assert_eq!(label, "lacp-fast");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_timestamp_result() {
    let server = MockServer::start().await;
    call("VM_metrics.get_start_time")
        .respond_with(reply(
            "<?xml version=\"1.0\"?><methodResponse><params><param>\
             <value><dateTime.iso8601>20250615T08:00:00Z</dateTime.iso8601></value>\
             </param></params></methodResponse>"
                .to_string(),
        ))
        .mount(&server)
        .await;
    let session = logged_in(&server, config(&server)).await;

    let started = VmMetrics::get_start_time(&session, &VmMetricsRef::new("OpaqueRef:m"))
        .await
        .unwrap();
    assert_eq!(started, Utc.with_ymd_and_hms(2025, 6, 15, 8, 0, 0).unwrap());
    assert_eq!(
        codec::encode_value(&Value::DateTime(started)),
        "<value><dateTime.iso8601>20250615T08:00:00Z</dateTime.iso8601></value>"
    );
}

#[tokio::test]
async fn test_status_envelope_response() {
    let server = MockServer::start().await;
    respond(
        &server,
        "Bond.get_all",
        success(Value::structure([
            ("Status", Value::from("Success")),
            ("Value", Value::Array(vec![Value::from("OpaqueRef:b1")])),
        ])),
    )
    .await;
    let session = logged_in(&server, config(&server)).await;

    let refs = Bond::get_all(&session).await.unwrap();
    assert_eq!(refs, vec![BondRef::new("OpaqueRef:b1")]);
}

#[tokio::test]
async fn test_map_with_a_status_key_is_not_an_envelope() {
    let server = MockServer::start().await;
    respond(
        &server,
        "pool.get_other_config",
        success(Value::structure([("Status", Value::from("degraded"))])),
    )
    .await;
    let session = logged_in(&server, config(&server)).await;

    let other_config = Pool::get_other_config(&session, &PoolRef::new("OpaqueRef:pool"))
        .await
        .unwrap();
    assert_eq!(
        other_config,
        HashMap::from([("Status".to_string(), "degraded".to_string())])
    );
}

#[tokio::test]
async fn test_storage_accessors() {
    let server = MockServer::start().await;
    respond(&server, "VDI.get_virtual_size", success(Value::from("10737418240"))).await;
    respond(&server, "VDI.get_type", success(Value::from("user"))).await;
    let session = logged_in(&server, config(&server)).await;

    let vdi = VdiRef::new("OpaqueRef:d");
    assert_eq!(Vdi::get_virtual_size(&session, &vdi).await.unwrap(), 10_737_418_240);
    assert_eq!(Vdi::get_type(&session, &vdi).await.unwrap(), VdiType::User);

    let calls = received_calls(&server).await;
    let call = calls.iter().find(|c| c.method == "VDI.get_type").unwrap();
    assert_eq!(call.params.len(), 2);
}

fn slow_config(server: &MockServer) -> ClientConfig {
    config(server)
        .with_request_timeout(Duration::from_millis(200))
        .with_max_retries(2)
}

#[tokio::test]
async fn test_deadline_covers_retries() {
    let server = MockServer::start().await;
    call("Bond.get_all")
        .respond_with(reply(success(Value::Array(Vec::new()))).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    let session = logged_in(&server, slow_config(&server)).await;

    let started = Instant::now();
    let err = Bond::get_all(&session).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(600));
    match err {
        Error::Transport(e) => {
            assert_eq!(e.kind, TransportErrorKind::Timeout);
            assert_eq!(e.attempts, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Serves plain TCP: reads one request per connection, then resets the
/// connection. Returns the endpoint and the methods received.
async fn resetting_server() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/", listener.local_addr().unwrap());
    let methods = Arc::new(Mutex::new(Vec::new()));

    let seen = methods.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut request = String::new();
            let mut buf = [0u8; 4096];
            while !request.contains("</methodCall>") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.push_str(&String::from_utf8_lossy(&buf[..n])),
                }
            }
            if let Some(method) = request
                .split_once("<methodName>")
                .and_then(|(_, rest)| rest.split_once("</methodName>"))
                .map(|(method, _)| method.to_string())
            {
                seen.lock().unwrap().push(method);
            }
            #[allow(deprecated)]
            let _ = stream.set_linger(Some(Duration::ZERO));
            drop(stream);
        }
    });

    (endpoint, methods)
}

fn reset_config(endpoint: &str) -> ClientConfig {
    ClientConfig::with_endpoint(endpoint)
        .with_credentials("alice", "s3cret")
        .with_request_timeout(Duration::from_secs(5))
        .with_max_retries(3)
        .with_backoff(xenapi::BackoffConfig::new_fixed_interval(Duration::from_millis(10)))
}

fn count(methods: &Mutex<Vec<String>>, name: &str) -> usize {
    methods.lock().unwrap().iter().filter(|m| *m == name).count()
}

#[tokio::test]
#[traced_test]
async fn test_reads_are_retried_after_a_connection_reset() {
    let (endpoint, methods) = resetting_server().await;
    let session = Session::new(reset_config(&endpoint)).unwrap();

    let err = session
        .resume(SessionRef::new("OpaqueRef:abc"))
        .await
        .unwrap_err();
    match err {
        Error::Transport(e) => {
            assert!(matches!(e.kind, TransportErrorKind::Io(_)), "{e:?}");
            assert_eq!(e.attempts, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(count(&methods, "session.get_uuid"), 4);
    assert!(logs_contain("Retrying"));
}

#[tokio::test]
async fn test_login_is_not_retried_after_a_connection_reset() {
    let (endpoint, methods) = resetting_server().await;
    let session = Session::new(reset_config(&endpoint)).unwrap();

    let err = session.login().await.unwrap_err();
    match err {
        Error::Transport(e) => {
            assert!(matches!(e.kind, TransportErrorKind::Io(_)), "{e:?}");
            assert_eq!(e.attempts, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(count(&methods, "session.login_with_password"), 1);
    assert_eq!(session.state(), SessionState::New);
}

#[tokio::test]
async fn test_writes_are_not_retried_after_a_timeout() {
    let server = MockServer::start().await;
    call("Bond.create")
        .respond_with(reply(success(Value::from("OpaqueRef:b"))).set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&server)
        .await;
    let session = logged_in(&server, slow_config(&server)).await;

    let err = Bond::create(
        &session,
        &NetworkRef::new("OpaqueRef:n"),
        &[PifRef::new("OpaqueRef:p1")],
        "",
        BondMode::Lacp,
        &HashMap::new(),
    )
    .await
    .unwrap_err();
    assert!(err.is_timeout());
    match err {
        Error::Transport(e) => assert_eq!(e.attempts, 1),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_status_is_not_retried() {
    let server = MockServer::start().await;
    call("Bond.get_all")
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance mode"))
        .expect(1)
        .mount(&server)
        .await;
    let session = logged_in(&server, slow_config(&server)).await;

    let err = Bond::get_all(&session).await.unwrap_err();
    match err {
        Error::Transport(e) => {
            assert_eq!(
                e.kind,
                TransportErrorKind::Status {
                    status: 503,
                    preview: "maintenance mode".to_string()
                }
            );
            assert_eq!(e.attempts, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_failures_are_retried_for_any_call() {
    let config = ClientConfig::with_endpoint("http://127.0.0.1:1/")
        .with_credentials("alice", "s3cret")
        .with_max_retries(2)
        .with_backoff(xenapi::BackoffConfig::new_fixed_interval(Duration::from_millis(5)));
    let session = Session::new(config).unwrap();

    let err = session.login().await.unwrap_err();
    match err {
        Error::Transport(e) => {
            assert!(matches!(e.kind, TransportErrorKind::Connect(_)));
            assert_eq!(e.attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_per_handle_timeout() {
    let server = MockServer::start().await;
    call("Bond.get_all")
        .respond_with(reply(success(Value::Array(Vec::new()))).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    let session = logged_in(&server, config(&server).with_max_retries(0)).await;

    let err = Bond::get_all(&session.with_timeout(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    // the default deadline is long enough
    assert!(Bond::get_all(&session).await.unwrap().is_empty());
}
