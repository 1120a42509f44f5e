// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous calls.
//!
//! `Async.Class.method` returns a task reference immediately. A
//! [`PendingTask`] polls that task until it reaches a terminal state and
//! decodes the stored result with the synchronous method's result type.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

// Third-party crates
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// Local crates
use xenapi_wire::codec;
use xenapi_wire::{Unmarshal, Value, check_result_class, decode};

use crate::api::{Task, TaskRef, TaskStatusType};
use crate::errors::{ApiFailure, Error, TransportError, TransportErrorKind};
use crate::session::Session;

/// Task `type` of a call that returns nothing.
const NO_RESULT_TYPE: &str = "<none/>";

/// A submitted asynchronous call whose result decodes to `T`.
#[must_use = "the task keeps running on the server until it is waited for or cancelled"]
pub struct PendingTask<T> {
    task: TaskRef,
    method: String,
    _result: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for PendingTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("task", &self.task)
            .field("method", &self.method)
            .finish()
    }
}

impl<T: Unmarshal> PendingTask<T> {
    pub(crate) fn new(task: TaskRef, method: &str) -> Self {
        Self {
            task,
            method: method.to_string(),
            _result: PhantomData,
        }
    }

    /// The server-side task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// The synchronous method this task runs.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub async fn status(&self, session: &Session) -> Result<TaskStatusType, Error> {
        Task::get_status(session, &self.task).await
    }

    /// Estimated completed fraction, between 0 and 1.
    pub async fn progress(&self, session: &Session) -> Result<f64, Error> {
        Task::get_progress(session, &self.task).await
    }

    /// Asks the server to cancel the task. The task may still complete.
    pub async fn cancel(&self, session: &Session) -> Result<(), Error> {
        Task::cancel(session, &self.task).await
    }

    /// Waits for the task without a way to cancel it.
    pub async fn wait_for_result(self, session: &Session) -> Result<T, Error> {
        self.wait(session, &CancellationToken::new()).await
    }

    /// Waits at most `deadline`. When it expires the task is cancelled on a
    /// best-effort basis and a timeout is returned.
    pub async fn wait_with_deadline(self, session: &Session, deadline: Duration) -> Result<T, Error> {
        let cancel = CancellationToken::new();
        let task = self.task.clone();
        match tokio::time::timeout(deadline, self.wait(session, &cancel)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%task, ?deadline, "task deadline expired, cancelling");
                if let Err(e) = Task::cancel(session, &task).await {
                    debug!(%task, error = %e, "cannot cancel task");
                }
                Err(TransportError::new(TransportErrorKind::Timeout).into())
            }
        }
    }

    /// Polls the task until it terminates and returns its decoded result.
    ///
    /// When `cancel` fires, `task.cancel` is issued and the call returns
    /// [`Error::Cancelled`] once the server reports the task cancelled or
    /// failed.
    pub async fn wait(self, session: &Session, cancel: &CancellationToken) -> Result<T, Error> {
        let outcome = self.poll(session, cancel).await;

        // the task is still running after a transport or session failure
        let terminal = !matches!(outcome, Err(Error::Transport(_) | Error::Session(_)));
        if terminal && session.config().destroy_task_on_completion {
            if let Err(e) = Task::destroy(session, &self.task).await {
                warn!(task = %self.task, error = %e, "cannot destroy task");
            }
        }

        outcome
    }

    async fn poll(&self, session: &Session, cancel: &CancellationToken) -> Result<T, Error> {
        let mut delays = session.config().task_poll.delays();

        loop {
            let status = match self.status(session).await {
                Ok(status) => status,
                Err(e) if e.is_timeout() => {
                    self.cancel_quietly(session).await;
                    return Err(e);
                }
                Err(e) => return Err(e),
            };
            debug!(task = %self.task, method = %self.method, %status, "polled task");

            match status {
                TaskStatusType::Success => return self.result(session).await,
                TaskStatusType::Failure => return Err(self.failure(session).await),
                TaskStatusType::Cancelled => return Err(Error::Cancelled),
                TaskStatusType::Pending | TaskStatusType::Cancelling => {}
            }

            let delay = delays.next().unwrap_or(Duration::from_secs(1));
            tokio::select! {
                _ = cancel.cancelled() => return self.abort(session).await,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Cancels the task and waits until the server stops it.
    async fn abort(&self, session: &Session) -> Result<T, Error> {
        debug!(task = %self.task, "cancelling task");
        self.cancel(session).await?;

        let mut delays = session.config().task_poll.delays();
        loop {
            match self.status(session).await? {
                TaskStatusType::Cancelled | TaskStatusType::Failure => return Err(Error::Cancelled),
                // finished before the cancellation reached it
                TaskStatusType::Success => return self.result(session).await,
                TaskStatusType::Pending | TaskStatusType::Cancelling => {}
            }
            tokio::time::sleep(delays.next().unwrap_or(Duration::from_secs(1))).await;
        }
    }

    async fn cancel_quietly(&self, session: &Session) {
        if let Err(e) = self.cancel(session).await {
            debug!(task = %self.task, error = %e, "cannot cancel task");
        }
    }

    async fn result(&self, session: &Session) -> Result<T, Error> {
        let encoded = Task::get_result(session, &self.task).await?;
        let tag = Task::get_type(session, &self.task).await?;

        let site = session.call_site(&self.method).result();
        let value = if encoded.trim().is_empty() {
            Value::String(String::new())
        } else if encoded.trim_start().starts_with('<') {
            codec::decode_value(&encoded)?
        } else {
            Value::String(encoded)
        };

        if tag != NO_RESULT_TYPE {
            check_result_class::<T>(&tag, &site)?;
        }
        Ok(decode::<T>(value, &session.call_site(&self.method))?)
    }

    async fn failure(&self, session: &Session) -> Error {
        match Task::get_error_info(session, &self.task).await {
            Ok(description) => ApiFailure::from_description(description).into(),
            Err(e) => e,
        }
    }
}
