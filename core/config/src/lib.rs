// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Configuration of XenAPI client sessions.

pub mod backoff;
pub mod client;
pub mod configuration;
pub mod credentials;
pub mod errors;
pub mod tls;

mod opaque;

pub use client::{BackoffConfig, ClientConfig, TaskPollConfig};
pub use configuration::Configuration;
pub use credentials::Credentials;
pub use errors::ConfigError;
pub use opaque::OpaqueString;
