// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Client SDK for the XenAPI management interface.
//!
//! Every class of the API is a namespace type (`Bond`, `Pif`, `Vm`, ...)
//! whose associated functions take the [`Session`] as first argument.
//! Methods that run as server tasks also come as `async_*` variants
//! returning a [`PendingTask`].

pub mod errors;
pub mod event;
pub mod session;
pub mod task;

mod api;
mod dispatch;
mod transport;

pub use api::*;
pub use errors::{ApiFailure, Error, SessionError, TransportError, TransportErrorKind};
pub use event::{EventBatch, EventRecord, EventStream};
pub use session::{CredentialProvider, Session, SessionState};
pub use task::PendingTask;

pub use tokio_util::sync::CancellationToken;
pub use xenapi_config::{
    BackoffConfig, ClientConfig, Credentials, TaskPollConfig, tls::TlsClientConfig,
};
pub use xenapi_wire::{DecodeMode, Record, Reference};
