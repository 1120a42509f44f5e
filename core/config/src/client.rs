// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use duration_string::DurationString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;
use xenapi_wire::DecodeMode;

use crate::backoff::Strategy;
use crate::backoff::exponential::Config as ExponentialBackoff;
use crate::backoff::fixedinterval::Config as FixedIntervalBackoff;
use crate::configuration::Configuration;
use crate::credentials::Credentials;
use crate::errors::ConfigError;
use crate::tls::TlsClientConfig;

/// Retry delay policy for transport failures.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum BackoffConfig {
    /// Exponential backoff retry config.
    Exponential(ExponentialBackoff),
    /// FixedInterval backoff retry config.
    FixedInterval(FixedIntervalBackoff),
}

impl BackoffConfig {
    pub fn new_exponential(base: u64, factor: u64, max_delay: Duration, jitter: bool) -> Self {
        BackoffConfig::Exponential(ExponentialBackoff::new(base, factor, max_delay, jitter))
    }

    pub fn new_fixed_interval(interval: Duration) -> Self {
        BackoffConfig::FixedInterval(FixedIntervalBackoff::new(interval))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Exponential(ExponentialBackoff::default())
    }
}

impl Strategy for BackoffConfig {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match self {
            BackoffConfig::Exponential(b) => b.get_strategy(),
            BackoffConfig::FixedInterval(b) => b.get_strategy(),
        }
    }
}

/// Cadence used when polling an asynchronous task.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct TaskPollConfig {
    /// Delay before the first poll.
    #[serde(default = "default_poll_initial_interval")]
    #[schemars(with = "String")]
    pub initial_interval: DurationString,

    /// Ceiling for the delay between polls.
    #[serde(default = "default_poll_max_interval")]
    #[schemars(with = "String")]
    pub max_interval: DurationString,

    /// Multiplier applied to the delay after every poll.
    #[serde(default = "default_poll_factor")]
    pub factor: u32,
}

impl Default for TaskPollConfig {
    fn default() -> Self {
        TaskPollConfig {
            initial_interval: default_poll_initial_interval(),
            max_interval: default_poll_max_interval(),
            factor: default_poll_factor(),
        }
    }
}

fn default_poll_initial_interval() -> DurationString {
    Duration::from_millis(50).into()
}

fn default_poll_max_interval() -> DurationString {
    Duration::from_secs(2).into()
}

fn default_poll_factor() -> u32 {
    2
}

impl TaskPollConfig {
    pub fn new(initial_interval: Duration, max_interval: Duration, factor: u32) -> Self {
        TaskPollConfig {
            initial_interval: initial_interval.into(),
            max_interval: max_interval.into(),
            factor,
        }
    }

    /// Endless sequence of delays between polls.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + Send + use<> {
        let max: Duration = self.max_interval.into();
        let factor = self.factor;
        let first: Duration = self.initial_interval.into();
        std::iter::successors(Some(first.min(max)), move |d| {
            Some(d.saturating_mul(factor).min(max))
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let initial: Duration = self.initial_interval.into();
        let max: Duration = self.max_interval.into();
        if initial.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "task_poll.initial_interval",
            });
        }
        if initial > max {
            return Err(ConfigError::InvalidTaskPoll(format!(
                "initial_interval {initial:?} exceeds max_interval {max:?}"
            )));
        }
        if self.factor == 0 {
            return Err(ConfigError::InvalidTaskPoll(
                "factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration of a XenAPI client session.
///
/// Everything here is checked by [`Configuration::validate`] before the
/// first request leaves the process.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ClientConfig {
    /// URL of the XML-RPC endpoint, usually `https://<pool master>/`.
    pub endpoint: String,

    /// Static credentials for `session.login_with_password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,

    /// Overall deadline of one call.
    #[serde(default = "default_request_timeout")]
    #[schemars(with = "String")]
    pub request_timeout: DurationString,

    /// Deadline for establishing a connection.
    #[serde(default = "default_connect_timeout")]
    #[schemars(with = "String")]
    pub connect_timeout: DurationString,

    /// How long an unused pooled connection is kept open.
    #[serde(default = "default_idle_timeout")]
    #[schemars(with = "String")]
    pub idle_timeout: DurationString,

    /// Bound on idle pooled connections to the endpoint.
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    /// TLS client configuration.
    #[serde(default)]
    pub tls: TlsClientConfig,

    /// Delays between retries of transient transport failures.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Maximum number of retries of a failed call.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Asynchronous task polling cadence.
    #[serde(default)]
    pub task_poll: TaskPollConfig,

    /// Appended to the SDK user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent_suffix: Option<String>,

    /// Destroy task objects once their result has been read.
    #[serde(default)]
    pub destroy_task_on_completion: bool,

    /// Log in again once when the server reports SESSION_INVALID.
    #[serde(default)]
    pub relogin_on_session_invalid: bool,

    /// Read the pool master API version right after login.
    #[serde(default)]
    pub discover_version: bool,

    /// Handling of undeclared record members in responses.
    #[serde(default)]
    pub decode_mode: DecodeMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: String::new(),
            credentials: None,
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            idle_timeout: default_idle_timeout(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            tls: TlsClientConfig::default(),
            backoff: BackoffConfig::default(),
            max_retries: default_max_retries(),
            task_poll: TaskPollConfig::default(),
            user_agent_suffix: None,
            destroy_task_on_completion: false,
            relogin_on_session_invalid: false,
            discover_version: false,
            decode_mode: DecodeMode::default(),
        }
    }
}

fn default_request_timeout() -> DurationString {
    Duration::from_secs(60).into()
}

fn default_connect_timeout() -> DurationString {
    Duration::from_secs(10).into()
}

fn default_idle_timeout() -> DurationString {
    Duration::from_secs(90).into()
}

fn default_pool_max_idle_per_host() -> usize {
    8
}

fn default_max_retries() -> usize {
    3
}

impl std::fmt::Display for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ClientConfig {{ endpoint: {}, username: {:?}, request_timeout: {}, connect_timeout: {}, tls: {:?}, backoff: {:?}, max_retries: {}, decode_mode: {:?} }}",
            self.endpoint,
            self.credentials.as_ref().map(|c| c.username()),
            self.request_timeout,
            self.connect_timeout,
            self.tls,
            self.backoff,
            self.max_retries,
            self.decode_mode,
        )
    }
}

impl Configuration for ClientConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        self.endpoint_url()?;

        if let Some(credentials) = &self.credentials {
            credentials.validate()?;
        }

        for (name, value) in [
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
        ] {
            if Duration::from(value).is_zero() {
                return Err(ConfigError::ZeroDuration { name });
            }
        }

        self.task_poll.validate()?;
        self.tls.validate()?;

        Ok(())
    }
}

impl ClientConfig {
    /// Creates a configuration for the given endpoint with every other
    /// option at its default.
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..Self::default()
        }
    }

    pub fn with_credentials(self, username: &str, password: &str) -> Self {
        Self {
            credentials: Some(Credentials::new(username, password)),
            ..self
        }
    }

    pub fn with_request_timeout(self, request_timeout: Duration) -> Self {
        Self {
            request_timeout: request_timeout.into(),
            ..self
        }
    }

    pub fn with_connect_timeout(self, connect_timeout: Duration) -> Self {
        Self {
            connect_timeout: connect_timeout.into(),
            ..self
        }
    }

    pub fn with_idle_timeout(self, idle_timeout: Duration) -> Self {
        Self {
            idle_timeout: idle_timeout.into(),
            ..self
        }
    }

    pub fn with_pool_max_idle_per_host(self, pool_max_idle_per_host: usize) -> Self {
        Self {
            pool_max_idle_per_host,
            ..self
        }
    }

    pub fn with_tls(self, tls: TlsClientConfig) -> Self {
        Self { tls, ..self }
    }

    pub fn with_backoff(self, backoff: BackoffConfig) -> Self {
        Self { backoff, ..self }
    }

    pub fn with_max_retries(self, max_retries: usize) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    pub fn with_task_poll(self, task_poll: TaskPollConfig) -> Self {
        Self { task_poll, ..self }
    }

    pub fn with_user_agent_suffix(self, suffix: &str) -> Self {
        Self {
            user_agent_suffix: Some(suffix.to_string()),
            ..self
        }
    }

    pub fn with_destroy_task_on_completion(self, destroy_task_on_completion: bool) -> Self {
        Self {
            destroy_task_on_completion,
            ..self
        }
    }

    pub fn with_relogin_on_session_invalid(self, relogin_on_session_invalid: bool) -> Self {
        Self {
            relogin_on_session_invalid,
            ..self
        }
    }

    pub fn with_discover_version(self, discover_version: bool) -> Self {
        Self {
            discover_version,
            ..self
        }
    }

    pub fn with_decode_mode(self, decode_mode: DecodeMode) -> Self {
        Self {
            decode_mode,
            ..self
        }
    }

    /// Parses the endpoint, accepting only http and https.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        let url = Url::parse(&self.endpoint)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    /// `xenapi-rust/<version>`, followed by the configured suffix.
    pub fn user_agent(&self) -> String {
        let base = concat!("xenapi-rust/", env!("CARGO_PKG_VERSION"));
        match &self.user_agent_suffix {
            Some(suffix) if !suffix.is_empty() => format!("{base} {suffix}"),
            _ => base.to_string(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout.into()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout.into()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout.into()
    }
}
