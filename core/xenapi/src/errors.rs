// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Third-party crates
use thiserror::Error;

// Local crates
use xenapi_config::ConfigError;
use xenapi_wire::CodecError;

use crate::api::ApiError;

/// Every failure the SDK reports.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("api failure: {0}")]
    Api(#[from] ApiFailure),
    #[error("the call was cancelled")]
    Cancelled,
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

impl Error {
    /// The server error code, for API failures.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Error::Api(failure) => Some(&failure.code),
            _ => None,
        }
    }

    pub fn is_session_invalid(&self) -> bool {
        self.api_code() == Some("SESSION_INVALID")
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError {
                kind: TransportErrorKind::Timeout,
                ..
            })
        )
    }
}

/// Why a request did not produce a usable HTTP response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    // Before the request reached the server
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("tls handshake failed: {0}")]
    Tls(String),

    // While waiting for or reading the response
    #[error("request timed out")]
    Timeout,
    #[error("i/o error: {0}")]
    Io(String),

    // The server answered
    #[error("http status {status}: {preview:?}")]
    Status { status: u16, preview: String },

    // Local
    #[error("cannot build the http client: {0}")]
    Setup(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (attempts: {attempts})")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// Number of times the request was sent.
    pub attempts: usize,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind) -> Self {
        Self { kind, attempts: 1 }
    }

    /// The request never reached the server, so any call may be sent again.
    pub fn is_pre_request(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Connect(_) | TransportErrorKind::Tls(_)
        )
    }

    /// The request may or may not have been processed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Timeout | TransportErrorKind::Io(_)
        )
    }

    /// The endpoint cannot be trusted any more.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Tls(_))
    }
}

/// A fault returned by the server.
///
/// `code` and `params` are kept verbatim; `error` is the typed view of the
/// same data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code} {params:?}")]
pub struct ApiFailure {
    pub code: String,
    pub params: Vec<String>,
    pub error: ApiError,
}

impl ApiFailure {
    pub fn new(code: impl Into<String>, params: Vec<String>) -> Self {
        let code = code.into();
        let error = ApiError::from_parts(&code, &params);
        Self {
            code,
            params,
            error,
        }
    }

    /// Builds the failure from an error description: the code followed by
    /// its parameters.
    pub fn from_description(mut description: Vec<String>) -> Self {
        if description.is_empty() {
            return Self::new("UNKNOWN_ERROR", Vec::new());
        }
        let code = description.remove(0);
        Self::new(code, description)
    }
}

/// Local session state violations, detected without a round-trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("the session is not logged in")]
    NotLoggedIn,
    #[error("the session has been logged out")]
    Closed,
    #[error("the session is broken, only logout is allowed: {0}")]
    Broken(String),
    #[error("no credentials available to log in")]
    MissingCredentials,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_failure_keeps_raw_data() {
        let failure = ApiFailure::new("VLAN_TAG_INVALID", vec!["5000".to_string()]);
        assert_eq!(failure.code, "VLAN_TAG_INVALID");
        assert_eq!(failure.params, vec!["5000"]);
        assert_eq!(
            failure.error,
            ApiError::VlanTagInvalid {
                tag: "5000".to_string()
            }
        );
        assert_eq!(failure.error.code(), "VLAN_TAG_INVALID");
    }

    #[test]
    fn test_unknown_code_is_preserved() {
        let failure = ApiFailure::from_description(vec![
            "SOME_FUTURE_ERROR".to_string(),
            "a".to_string(),
            "b".to_string(),
        ]);
        assert_eq!(
            failure.error,
            ApiError::Other {
                code: "SOME_FUTURE_ERROR".to_string(),
                params: vec!["a".to_string(), "b".to_string()],
            }
        );
        assert_eq!(failure.error.code(), "SOME_FUTURE_ERROR");
    }

    #[test]
    fn test_missing_params_are_empty() {
        let failure = ApiFailure::new("HOST_IS_SLAVE", Vec::new());
        assert_eq!(
            failure.error,
            ApiError::HostIsSlave {
                master_address: String::new()
            }
        );
    }

    #[test]
    fn test_retry_classes() {
        let connect = TransportError::new(TransportErrorKind::Connect("refused".into()));
        assert!(connect.is_pre_request());
        assert!(!connect.is_transient());

        let reset = TransportError::new(TransportErrorKind::Io("connection reset".into()));
        assert!(reset.is_transient());
        assert!(!reset.is_pre_request());

        let status = TransportError::new(TransportErrorKind::Status {
            status: 500,
            preview: String::new(),
        });
        assert!(!status.is_transient() && !status.is_pre_request());

        let tls = TransportError::new(TransportErrorKind::Tls("bad certificate".into()));
        assert!(tls.is_fatal());
    }

    #[test]
    fn test_error_accessors() {
        let err = Error::from(ApiFailure::new("SESSION_INVALID", vec!["x".to_string()]));
        assert!(err.is_session_invalid());
        assert_eq!(err.api_code(), Some("SESSION_INVALID"));

        let err = Error::from(TransportError::new(TransportErrorKind::Timeout));
        assert!(err.is_timeout());
        assert_eq!(err.api_code(), None);
    }
}
