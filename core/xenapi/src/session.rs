// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Authenticated connection to a pool.
//!
//! A [`Session`] owns the transport and the session reference returned by
//! login. It is cheap to clone and safe to share between tasks: clones
//! talk to the server through the same connection pool and see the same
//! login state.
//!
//! ```ignore
//! let session = Session::new(ClientConfig::with_endpoint("https://pool-master/"))?;
//! session.login_with_password("root", "secret", "2.21", "my-tool").await?;
//! let bonds = Bond::get_all(&session).await?;
//! session.logout().await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Third-party crates
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

// Local crates
use xenapi_config::{ClientConfig, Configuration, Credentials};
use xenapi_wire::codec;
use xenapi_wire::{CallSite, Unmarshal, Value};

use crate::api::{ApiVersion, Host, Pool, SessionApi, SessionRef, TaskRef};
use crate::dispatch;
use crate::errors::{Error, SessionError, TransportError};
use crate::task::PendingTask;

/// Sent as `originator` by [`Session::login`].
pub const ORIGINATOR: &str = "xenapi-rust";

/// Source of the credentials used to log in, and to log in again after
/// the server invalidated the session.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Result<Credentials, Error>;
}

#[async_trait]
impl CredentialProvider for Credentials {
    async fn credentials(&self) -> Result<Credentials, Error> {
        Ok(self.clone())
    }
}

/// Client view of the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No login yet.
    New,
    Active,
    /// The server reported `SESSION_INVALID` for the current reference.
    Stale,
    /// A fatal transport failure happened; only logout is allowed.
    Broken,
    /// Logged out.
    Closed,
}

enum State {
    New,
    Active(SessionRef),
    Stale(SessionRef),
    Broken { reference: SessionRef, reason: String },
    Closed,
}

impl State {
    fn public(&self) -> SessionState {
        match self {
            State::New => SessionState::New,
            State::Active(_) => SessionState::Active,
            State::Stale(_) => SessionState::Stale,
            State::Broken { .. } => SessionState::Broken,
            State::Closed => SessionState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginKind {
    Password,
    SlaveLocal,
}

struct Inner {
    config: ClientConfig,
    transport: crate::transport::Transport,
    credentials: Option<Arc<dyn CredentialProvider>>,
    state: RwLock<State>,
    login_kind: Mutex<LoginKind>,
    version: RwLock<ApiVersion>,
    xapi_version: RwLock<Option<String>>,
    calls: AtomicU64,
    // serializes re-login attempts
    relogin: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
    timeout: Duration,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.inner.transport.url().as_str())
            .field("state", &self.state())
            .field("api_version", &self.api_version())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Session {
    /// Creates a session for `config`. Static credentials in the
    /// configuration are used by [`Session::login`] and for re-login.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let credentials = config
            .credentials
            .clone()
            .map(|c| Arc::new(c) as Arc<dyn CredentialProvider>);
        Self::build(config, credentials)
    }

    /// Like [`Session::new`], with credentials fetched from `provider`.
    pub fn with_credential_provider(
        config: ClientConfig,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, Error> {
        Self::build(config, Some(provider))
    }

    fn build(
        config: ClientConfig,
        credentials: Option<Arc<dyn CredentialProvider>>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let transport = crate::transport::Transport::new(&config)?;
        let timeout = config.request_timeout();

        debug!(%config, "created session");

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport,
                credentials,
                state: RwLock::new(State::New),
                login_kind: Mutex::new(LoginKind::Password),
                version: RwLock::new(ApiVersion::Unknown),
                xapi_version: RwLock::new(None),
                calls: AtomicU64::new(0),
                relogin: tokio::sync::Mutex::new(()),
            }),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        self.inner.transport.url()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.read().public()
    }

    /// The current session reference, if logged in.
    pub fn reference(&self) -> Option<SessionRef> {
        match &*self.inner.state.read() {
            State::Active(r) | State::Stale(r) => Some(r.clone()),
            State::Broken { reference, .. } => Some(reference.clone()),
            State::New | State::Closed => None,
        }
    }

    /// API version of the pool master, `Unknown` until discovered.
    pub fn api_version(&self) -> ApiVersion {
        *self.inner.version.read()
    }

    /// The `xapi` entry of the pool master software version, once
    /// discovered.
    pub fn xapi_version(&self) -> Option<String> {
        self.inner.xapi_version.read().clone()
    }

    /// Number of calls dispatched by this session and its clones.
    pub fn call_count(&self) -> u64 {
        self.inner.calls.load(Ordering::Relaxed)
    }

    /// Overall deadline of each call made through this handle.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A handle on the same session whose calls use another deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Session {
        Session {
            inner: self.inner.clone(),
            timeout,
        }
    }

    /// The root of the call-site path of `method`.
    pub fn call_site(&self, method: &str) -> CallSite {
        CallSite::new(method).with_mode(self.inner.config.decode_mode)
    }

    // Login and logout

    /// Logs in with the configured credentials.
    pub async fn login(&self) -> Result<SessionRef, Error> {
        let credentials = self.credentials().await?;
        self.login_with_password(
            credentials.username(),
            credentials.password().as_ref(),
            &ApiVersion::LATEST.to_string(),
            ORIGINATOR,
        )
        .await
    }

    pub async fn login_with_password(
        &self,
        uname: &str,
        pwd: &str,
        version: &str,
        originator: &str,
    ) -> Result<SessionRef, Error> {
        self.ensure_not_closed()?;
        let reference = SessionApi::login_with_password(self, uname, pwd, version, originator).await?;
        self.activate(reference.clone(), LoginKind::Password).await;
        Ok(reference)
    }

    /// Emergency login against a pool member whose master is unreachable.
    pub async fn slave_local_login_with_password(
        &self,
        uname: &str,
        pwd: &str,
    ) -> Result<SessionRef, Error> {
        self.ensure_not_closed()?;
        let reference = SessionApi::slave_local_login_with_password(self, uname, pwd).await?;
        self.activate(reference.clone(), LoginKind::SlaveLocal).await;
        Ok(reference)
    }

    /// Adopts a reference obtained elsewhere, after checking with the
    /// server that it is still valid.
    pub async fn resume(&self, reference: SessionRef) -> Result<(), Error> {
        self.ensure_not_closed()?;

        let method = "session.get_uuid";
        let site = self.call_site(method);
        let args = vec![Value::String(reference.expose().to_string())];
        let uuid: String = self.invoke(method, &site, Some(&reference), args).await?;

        info!(endpoint = %self.endpoint(), %uuid, "resumed session");
        self.activate(reference, LoginKind::Password).await;
        Ok(())
    }

    /// Logs out. The session cannot be used afterwards, whatever the
    /// outcome of the call.
    pub async fn logout(&self) -> Result<(), Error> {
        match self.state() {
            SessionState::New => return Err(SessionError::NotLoggedIn.into()),
            SessionState::Closed => return Err(SessionError::Closed.into()),
            _ => {}
        }

        let result = SessionApi::logout(self).await;
        *self.inner.state.write() = State::Closed;
        info!(endpoint = %self.endpoint(), "logged out");
        result
    }

    fn ensure_not_closed(&self) -> Result<(), Error> {
        match self.state() {
            SessionState::Closed => Err(SessionError::Closed.into()),
            _ => Ok(()),
        }
    }

    async fn credentials(&self) -> Result<Credentials, Error> {
        match &self.inner.credentials {
            Some(provider) => provider.credentials().await,
            None => Err(SessionError::MissingCredentials.into()),
        }
    }

    async fn activate(&self, reference: SessionRef, kind: LoginKind) {
        *self.inner.state.write() = State::Active(reference);
        *self.inner.login_kind.lock() = kind;
        info!(endpoint = %self.endpoint(), ?kind, "logged in");

        if self.inner.config.discover_version {
            match self.discover_version().await {
                Ok(version) => info!(%version, "discovered server API version"),
                Err(e) => warn!(error = %e, "cannot discover the server API version"),
            }
        }
    }

    /// Reads the API version of the pool master.
    async fn discover_version(&self) -> Result<ApiVersion, Error> {
        let pools = Pool::get_all(self).await?;
        let Some(pool) = pools.first() else {
            return Ok(ApiVersion::Unknown);
        };

        let master = Pool::get_master(self, pool).await?;
        let major = Host::get_api_version_major(self, &master).await?;
        let minor = Host::get_api_version_minor(self, &master).await?;
        let software = Host::get_software_version(self, &master).await?;

        let version = ApiVersion::from_parts(major, minor);
        *self.inner.version.write() = version;
        *self.inner.xapi_version.write() = software.get("xapi").cloned();
        Ok(version)
    }

    // Dispatch, used by the generated surface

    pub(crate) async fn call<T: Unmarshal>(
        &self,
        method: &str,
        site: &CallSite,
        args: Vec<Value>,
    ) -> Result<T, Error> {
        let token = self.token(method)?;
        let retry_args = self.relogin_enabled(method).then(|| args.clone());

        match self.invoke(method, site, Some(&token), args).await {
            Err(e) if e.is_session_invalid() => {
                self.mark_stale(&token);
                let Some(args) = retry_args else {
                    return Err(e);
                };
                let fresh = self.relogin(&token).await?;
                self.invoke(method, site, Some(&fresh), args).await
            }
            result => result,
        }
    }

    pub(crate) async fn call_anonymous<T: Unmarshal>(
        &self,
        method: &str,
        site: &CallSite,
        args: Vec<Value>,
    ) -> Result<T, Error> {
        self.invoke(method, site, None, args).await
    }

    pub(crate) async fn submit<T: Unmarshal>(
        &self,
        method: &str,
        site: &CallSite,
        args: Vec<Value>,
    ) -> Result<PendingTask<T>, Error> {
        let task: TaskRef = self.call(&format!("Async.{method}"), site, args).await?;
        debug!(method, %task, "submitted asynchronous call");
        Ok(PendingTask::new(task, method))
    }

    async fn invoke<T: Unmarshal>(
        &self,
        method: &str,
        site: &CallSite,
        token: Option<&SessionRef>,
        args: Vec<Value>,
    ) -> Result<T, Error> {
        let mut params = Vec::with_capacity(args.len() + 1);
        if let Some(token) = token {
            params.push(Value::String(token.expose().to_string()));
        }
        params.extend(args);

        let call = self.inner.calls.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(method, call, "dispatching call");

        let body = codec::encode_call(method, &params);
        let xml = match self.inner.transport.post(method, body, self.timeout).await {
            Ok(xml) => xml,
            Err(e) => {
                if let Some(token) = token {
                    self.mark_broken(token, &e);
                }
                return Err(e.into());
            }
        };

        dispatch::decode_result(&xml, site)
    }

    // State transitions

    fn token(&self, method: &str) -> Result<SessionRef, Error> {
        match &*self.inner.state.read() {
            State::Active(r) | State::Stale(r) => Ok(r.clone()),
            State::Broken { reference, .. } if method == "session.logout" => Ok(reference.clone()),
            State::Broken { reason, .. } => Err(SessionError::Broken(reason.clone()).into()),
            State::New => Err(SessionError::NotLoggedIn.into()),
            State::Closed => Err(SessionError::Closed.into()),
        }
    }

    fn relogin_enabled(&self, method: &str) -> bool {
        self.inner.config.relogin_on_session_invalid
            && self.inner.credentials.is_some()
            && method != "session.logout"
    }

    fn mark_stale(&self, token: &SessionRef) {
        let mut state = self.inner.state.write();
        if matches!(&*state, State::Active(r) if r == token) {
            *state = State::Stale(token.clone());
        }
    }

    fn mark_broken(&self, token: &SessionRef, error: &TransportError) {
        if !error.is_fatal() {
            return;
        }
        let mut state = self.inner.state.write();
        if matches!(&*state, State::Active(r) | State::Stale(r) if r == token) {
            warn!(error = %error, "session is broken");
            *state = State::Broken {
                reference: token.clone(),
                reason: error.to_string(),
            };
        }
    }

    /// The active reference when it differs from `stale`.
    fn refreshed(&self, stale: &SessionRef) -> Option<SessionRef> {
        match &*self.inner.state.read() {
            State::Active(current) if current != stale => Some(current.clone()),
            _ => None,
        }
    }

    /// Logs in again after `stale` was reported invalid. Concurrent callers
    /// wait for a single attempt and share its result.
    async fn relogin(&self, stale: &SessionRef) -> Result<SessionRef, Error> {
        let _guard = self.inner.relogin.lock().await;
        if let Some(current) = self.refreshed(stale) {
            return Ok(current);
        }
        if self.state() != SessionState::Stale {
            return Err(SessionError::Closed.into());
        }

        warn!(endpoint = %self.endpoint(), "session invalidated by the server, logging in again");
        let kind = *self.inner.login_kind.lock();
        let result = match self.credentials().await {
            Ok(credentials) => {
                let username = credentials.username();
                let password = credentials.password().as_ref();
                match kind {
                    LoginKind::Password => {
                        SessionApi::login_with_password(
                            self,
                            username,
                            password,
                            &ApiVersion::LATEST.to_string(),
                            ORIGINATOR,
                        )
                        .await
                    }
                    LoginKind::SlaveLocal => {
                        SessionApi::slave_local_login_with_password(self, username, password).await
                    }
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(reference) => {
                *self.inner.state.write() = State::Active(reference.clone());
                info!(endpoint = %self.endpoint(), "logged in again");
                Ok(reference)
            }
            Err(e) => {
                *self.inner.state.write() = State::Closed;
                warn!(error = %e, "re-login failed, session closed");
                Err(e)
            }
        }
    }
}
