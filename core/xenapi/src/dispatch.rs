// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Turning a response document into a typed result or an API failure.
//!
//! The service reports failures in one of three shapes:
//!
//! * an XML-RPC `<fault>` whose `faultString` is a JSON array
//!   `["CODE", "param", ...]`,
//! * a `<fault>` whose `faultString` is the bare code,
//! * a successful response carrying the status envelope
//!   `{Status: "Failure", ErrorDescription: ["CODE", ...]}`.
//!
//! Successful envelopes (`{Status: "Success", Value: v}`) are unwrapped
//! before the result is decoded.

use tracing::warn;

use xenapi_wire::codec::{self, MethodResponse};
use xenapi_wire::{CallSite, Fault, Unmarshal, Value, decode};

use crate::api::ApiVersion;
use crate::errors::{ApiFailure, Error};

/// Decodes the response to a call made at `site`.
pub(crate) fn decode_result<T: Unmarshal>(xml: &str, site: &CallSite) -> Result<T, Error> {
    match codec::decode_response(xml)? {
        MethodResponse::Fault(fault) => Err(Error::Api(fault_failure(&fault))),
        MethodResponse::Success(value) => {
            let value = unwrap_envelope(value)?;
            Ok(decode::<T>(value, site)?)
        }
    }
}

/// Reconstructs the failure a `<fault>` carries.
pub(crate) fn fault_failure(fault: &Fault) -> ApiFailure {
    let message = fault.message.trim();

    if let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(message) {
        let description = items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        return ApiFailure::from_description(description);
    }

    if is_error_code(message) {
        return ApiFailure::new(message, Vec::new());
    }

    ApiFailure::new(
        "XMLRPC_FAULT",
        vec![fault.code.to_string(), fault.message.clone()],
    )
}

fn is_error_code(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Strips the status envelope, if the value is one.
///
/// Only the exact shapes `{Status: "Success", Value}` and
/// `{Status: "Failure", ErrorDescription}` are envelopes. Any other struct,
/// such as a map that happens to have a `Status` key, is the result itself.
fn unwrap_envelope(value: Value) -> Result<Value, Error> {
    let Value::Struct(mut members) = value else {
        return Ok(value);
    };

    let status = match members.get("Status") {
        Some(Value::String(status)) if members.len() == 2 => status.clone(),
        _ => return Ok(Value::Struct(members)),
    };

    match status.as_str() {
        "Success" => {
            if let Some(value) = members.remove("Value") {
                return Ok(value);
            }
        }
        "Failure" => {
            if let Some(description) = members.remove("ErrorDescription") {
                let description = match description {
                    Value::Array(items) => items.iter().map(describe).collect(),
                    other => vec![describe(&other)],
                };
                return Err(Error::Api(ApiFailure::from_description(description)));
            }
        }
        _ => {}
    }
    Ok(Value::Struct(members))
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => codec::encode_value(other),
    }
}

/// Called by canonical methods that fall back to an older arity because
/// the server predates some of their parameters.
pub(crate) fn dropped_params(method: &str, version: ApiVersion, params: &[&str]) {
    warn!(
        method,
        version = %version,
        dropped = ?params,
        "server API version predates some parameters, calling an older arity"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, BondRef};
    use std::collections::HashMap;
    use tracing_test::traced_test;
    use xenapi_wire::codec::encode_response;

    fn site() -> CallSite {
        CallSite::new("Bond.get_all")
    }

    fn response(value: Value) -> String {
        encode_response(&MethodResponse::Success(value))
    }

    fn fault(message: &str) -> String {
        encode_response(&MethodResponse::Fault(Fault {
            code: 1,
            message: message.to_string(),
        }))
    }

    #[test]
    fn test_plain_success() {
        let xml = response(Value::Array(vec![Value::from("OpaqueRef:b1")]));
        let refs: Vec<BondRef> = decode_result(&xml, &site()).unwrap();
        assert_eq!(refs, vec![BondRef::new("OpaqueRef:b1")]);
    }

    #[test]
    fn test_json_fault() {
        let xml = fault(r#"["VLAN_TAG_INVALID", "5000"]"#);
        let err = decode_result::<()>(&xml, &site()).unwrap_err();
        match err {
            Error::Api(failure) => {
                assert_eq!(failure.code, "VLAN_TAG_INVALID");
                assert_eq!(failure.params, vec!["5000"]);
                assert_eq!(
                    failure.error,
                    ApiError::VlanTagInvalid {
                        tag: "5000".to_string()
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bare_code_fault() {
        let failure = fault_failure(&Fault {
            code: 1,
            message: "SESSION_AUTHENTICATION_FAILED".to_string(),
        });
        assert_eq!(failure.code, "SESSION_AUTHENTICATION_FAILED");
        assert!(failure.params.is_empty());
    }

    #[test]
    fn test_free_text_fault() {
        let failure = fault_failure(&Fault {
            code: -32601,
            message: "no such method".to_string(),
        });
        assert_eq!(failure.code, "XMLRPC_FAULT");
        assert_eq!(failure.params, vec!["-32601", "no such method"]);
    }

    #[test]
    fn test_status_envelope() {
        let ok = response(Value::structure([
            ("Status", Value::from("Success")),
            ("Value", Value::Array(vec![Value::from("OpaqueRef:b2")])),
        ]));
        let refs: Vec<BondRef> = decode_result(&ok, &site()).unwrap();
        assert_eq!(refs, vec![BondRef::new("OpaqueRef:b2")]);

        let failed = response(Value::structure([
            ("Status", Value::from("Failure")),
            (
                "ErrorDescription",
                Value::Array(vec![
                    Value::from("PIF_ALLOWS_UNPLUG"),
                    Value::from("OpaqueRef:p"),
                ]),
            ),
        ]));
        let err = decode_result::<()>(&failed, &site()).unwrap_err();
        assert_eq!(err.api_code(), Some("PIF_ALLOWS_UNPLUG"));
        match err {
            Error::Api(failure) => assert_eq!(
                failure.error,
                ApiError::PifAllowsUnplug {
                    pif: "OpaqueRef:p".to_string()
                }
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_map_with_status_key_is_a_result() {
        let xml = response(Value::structure([("Status", Value::from("degraded"))]));
        let map: HashMap<String, String> = decode_result(&xml, &site()).unwrap();
        assert_eq!(map.get("Status").map(String::as_str), Some("degraded"));

        let xml = response(Value::structure([("Status", Value::from("Success"))]));
        let map: HashMap<String, String> = decode_result(&xml, &site()).unwrap();
        assert_eq!(map.len(), 1);

        let xml = response(Value::structure([
            ("Status", Value::from("Failure")),
            ("ErrorDescription", Value::Array(Vec::new())),
            ("owner", Value::from("ops")),
        ]));
        let map: HashMap<String, Value> = decode_result(&xml, &site()).unwrap();
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_codec_failure_names_the_site() {
        let xml = response(Value::from(3));
        let err = decode_result::<Vec<BondRef>>(&xml, &site()).unwrap_err();
        match err {
            Error::Codec(e) => assert_eq!(e.site(), Some("Bond.get_all -> ")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[traced_test]
    #[test]
    fn test_dropped_params_warns() {
        dropped_params("Bond.create", ApiVersion::Boston, &["properties"]);
        assert!(logs_contain("calling an older arity"));
        assert!(logs_contain("Bond.create"));
    }
}
