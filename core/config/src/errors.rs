// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors for client configuration. All of them are raised before any I/O.
#[derive(Error, Debug)]
pub enum ConfigError {
    // Endpoint
    #[error("missing endpoint")]
    MissingEndpoint,
    #[error("endpoint parse error: {0}")]
    EndpointParse(#[from] url::ParseError),
    #[error("unsupported endpoint scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    // Credentials
    #[error("credentials with an empty username")]
    EmptyUsername,

    // Durations and polling
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },
    #[error("invalid task poll configuration: {0}")]
    InvalidTaskPoll(String),

    // TLS
    #[error("insecure_skip_verify cannot be combined with custom trust roots")]
    InsecureWithCustomRoots,
    #[error("no trust roots configured")]
    NoTrustRoots,
    #[error("invalid pem format: {0}")]
    InvalidPem(#[from] rustls_pki_types::pem::Error),
    #[error("root store error: {0}")]
    RootStore(rustls::Error),
}
