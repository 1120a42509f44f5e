// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! HTTP(S) transport of XML-RPC documents.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio::time::Instant;
use tokio_retry::RetryIf;
use tracing::{debug, warn};
use url::Url;

use xenapi_config::ClientConfig;
use xenapi_config::backoff::Strategy;
use xenapi_config::tls::provider::initialize_crypto_provider;

use crate::errors::{TransportError, TransportErrorKind};

const XML: &str = "text/xml";

/// Bytes of a non-2xx response body kept in the error.
const PREVIEW_LEN: usize = 256;

/// Only reads are safe to send twice once the server may have seen them.
pub(crate) fn is_idempotent(method: &str) -> bool {
    method
        .rsplit('.')
        .next()
        .is_some_and(|name| name.starts_with("get_"))
}

pub(crate) struct Transport {
    client: reqwest::Client,
    url: Url,
    config: ClientConfig,
}

impl Transport {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self, crate::errors::Error> {
        let url = config.endpoint_url()?;

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(config.idle_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host);

        if url.scheme() == "https" {
            builder = match config.tls.load_rustls_config()? {
                Some(tls) => builder.use_preconfigured_tls(std::sync::Arc::unwrap_or_clone(tls)),
                None => builder.danger_accept_invalid_certs(true),
            };
        } else {
            // the rustls backend is built even for plain http
            initialize_crypto_provider();
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::new(TransportErrorKind::Setup(e.to_string())))?;

        Ok(Self {
            client,
            url,
            config: config.clone(),
        })
    }

    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    /// Posts `body` and returns the response text.
    ///
    /// `timeout` is the deadline of the whole call, retries included.
    /// Transient failures are retried with the configured backoff while
    /// time remains: any method when the request never left, `get_*`
    /// methods otherwise.
    pub(crate) async fn post(
        &self,
        method: &str,
        body: String,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let deadline = Instant::now() + timeout;
        let attempts = AtomicUsize::new(0);
        let idempotent = is_idempotent(method);
        let strategy = self
            .config
            .backoff
            .get_strategy()
            .take(self.config.max_retries);

        let counter = &attempts;
        let body = body.as_str();
        let retry = RetryIf::spawn(
            strategy,
            || async move {
                counter.fetch_add(1, Ordering::Relaxed);
                let remaining = deadline.saturating_duration_since(Instant::now());
                self.send(body.to_string(), remaining).await
            },
            |e: &TransportError| {
                let retry = (e.is_pre_request() || (idempotent && e.is_transient()))
                    && Instant::now() < deadline;
                if retry {
                    warn!(
                        method,
                        attempt = attempts.load(Ordering::Relaxed),
                        error = %e.kind,
                        "transport failure. Retrying..."
                    );
                }
                retry
            },
        );

        let result = match tokio::time::timeout_at(deadline, retry).await {
            Ok(result) => result,
            Err(_) => {
                debug!(method, ?timeout, "call deadline expired");
                Err(TransportError::new(TransportErrorKind::Timeout))
            }
        };

        result.map_err(|mut e| {
            e.attempts = attempts.load(Ordering::Relaxed);
            e
        })
    }

    async fn send(&self, body: String, timeout: Duration) -> Result<String, TransportError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, XML)
            .header(ACCEPT, XML)
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            debug!(status = %status, "non-success http status");
            return Err(TransportError::new(TransportErrorKind::Status {
                status: status.as_u16(),
                preview: text.chars().take(PREVIEW_LEN).collect(),
            }));
        }

        Ok(text)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    let kind = if e.is_timeout() {
        TransportErrorKind::Timeout
    } else if is_tls_error(&e) {
        TransportErrorKind::Tls(e.to_string())
    } else if e.is_connect() {
        TransportErrorKind::Connect(e.to_string())
    } else if e.is_builder() {
        TransportErrorKind::Setup(e.to_string())
    } else {
        TransportErrorKind::Io(describe(&e))
    };
    TransportError::new(kind)
}

/// Looks for a rustls error anywhere in the cause chain.
fn is_tls_error(e: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = e.source();
    while let Some(cause) = source {
        if cause.is::<rustls::Error>() {
            return true;
        }
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.get_ref().is_some_and(|inner| inner.is::<rustls::Error>()) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// The error with its causes, so that e.g. a connection reset is visible.
fn describe(e: &reqwest::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
