//! Intercepting REST client.
//!
//! Every call goes through [`ApiClient::execute`], which injects the bearer
//! token, recovers from expired tokens through the refresh coordinator, and
//! turns failures into classified errors plus user notices.

use bytes::Bytes;
use desk_core::{Error, ErrorClass, RefreshRequest, Result, SessionEnd, TokenResponse};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, info, warn};

use crate::config::SessionPolicy;
use crate::hooks::{LoginRedirect, Navigator, Notice, Notifier};
use crate::refresh::{RefreshCoordinator, RefreshTicket};
use crate::store::SessionStore;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

pub const NOTICE_FORBIDDEN: &str = "You do not have permission to access this resource";
pub const NOTICE_NOT_FOUND: &str = "The requested resource does not exist";
pub const NOTICE_SERVER_ERROR: &str = "Server error";
pub const NOTICE_REQUEST_FAILED: &str = "Request failed";
pub const NOTICE_NETWORK: &str = "Network error, please check your connection";

const LOGIN_ENDPOINT: &str = "/auth/login";
const REFRESH_ENDPOINT: &str = "/auth/refresh";

/// Which interception rules apply to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRoute {
    /// The login call: a 401 is a bad password, rendered by the caller.
    Login,
    /// `POST .../contracts`: failures carry business detail for the caller.
    CreateContract,
    Standard,
}

impl RequestRoute {
    pub fn classify(request: &ApiRequest) -> Self {
        let path = request.bare_path();
        if path.contains(LOGIN_ENDPOINT) {
            Self::Login
        } else if request.method == Method::Post && path.ends_with("/contracts") {
            Self::CreateContract
        } else {
            Self::Standard
        }
    }

    /// Whether a 401 on this route goes through refresh-and-retry.
    fn refreshes_on_unauthorized(&self) -> bool {
        matches!(self, Self::Standard)
    }

    fn error_class(&self, status: u16) -> ErrorClass {
        match (self, status) {
            (Self::Login, 401) => ErrorClass::LoginRejected,
            (Self::CreateContract, _) => ErrorClass::BusinessCreate,
            _ => ErrorClass::from_status(status),
        }
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    store: SessionStore,
    refresh: RefreshCoordinator,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    policy: SessionPolicy,
}

/// Session-aware API client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                store,
                refresh: RefreshCoordinator::new(),
                notifier,
                navigator,
                policy,
            }),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.inner.notifier
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.inner.policy
    }

    /// Send a request through the full pipeline.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let route = RequestRoute::classify(&request);
        let mut token = self.inner.store.access_token();
        let mut retries = 0u32;

        loop {
            let response = match self.send_once(&request, token.as_deref()).await {
                Ok(response) => response,
                Err(e) => {
                    self.surface(&e);
                    return Err(e);
                }
            };

            if response.is_success() {
                return Ok(response);
            }

            if response.status == 401 && route.refreshes_on_unauthorized() {
                if retries >= self.inner.policy.max_auth_retries {
                    debug!(path = %request.path, "Retried request rejected again, giving up");
                    return Err(response.into_error(ErrorClass::TokenExpired));
                }
                retries += 1;
                token = Some(self.recover(token.as_deref()).await?);
                metrics().retries_sent.inc();
                continue;
            }

            let class = route.error_class(response.status);
            let error = response.into_error(class);
            self.surface(&error);
            return Err(error);
        }
    }

    /// Execute and decode a JSON body.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.execute(request).await?.json()
    }

    /// Execute and return the raw body (file downloads).
    pub async fn fetch_bytes(&self, request: ApiRequest) -> Result<Bytes> {
        Ok(self.execute(request).await?.body)
    }

    async fn send_once(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse> {
        let started = Instant::now();
        metrics().requests_sent.inc();
        let outcome = self.inner.transport.send(request, token).await;
        metrics()
            .request_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        match &outcome {
            Ok(response) if !response.is_success() => {
                metrics().http_errors.inc();
                debug!(
                    method = request.method.as_str(),
                    path = %request.path,
                    status = response.status,
                    "Request failed"
                );
            }
            Err(_) => metrics().network_errors.inc(),
            Ok(_) => {}
        }
        outcome
    }

    /// Obtain a usable access token after a 401 sent with `sent_token`.
    async fn recover(&self, sent_token: Option<&str>) -> Result<String> {
        let store = &self.inner.store;
        // The session was ended while this request was in flight.
        if sent_token.is_some() && !store.is_authenticated() {
            debug!("Session already ended, not redirecting again");
            return Err(Error::Session(SessionEnd::NoRefreshToken));
        }
        if store.refresh_token().is_none() {
            warn!("Access token rejected and no refresh token held, ending session");
            self.end_session();
            return Err(Error::Session(SessionEnd::NoRefreshToken));
        }

        let lease = match self.inner.refresh.acquire() {
            RefreshTicket::Follower(waiter) => {
                metrics().retries_queued.inc();
                return match waiter.await {
                    Ok(Ok(token)) => Ok(token),
                    Ok(Err(reason)) => Err(Error::Session(reason)),
                    Err(_) => Err(Error::Session(SessionEnd::RefreshAbandoned)),
                };
            }
            RefreshTicket::Leader(lease) => lease,
        };

        // A refresh may have committed between sending and now.
        if let Some(current) = store.access_token() {
            if sent_token != Some(current.as_str()) {
                debug!("Token rotated since the request was sent, retrying with current token");
                lease.resolve(current.clone());
                return Ok(current);
            }
        }

        let Some(refresh_token) = store.refresh_token() else {
            lease.reject(SessionEnd::NoRefreshToken);
            self.end_session();
            return Err(Error::Session(SessionEnd::NoRefreshToken));
        };

        metrics().refresh_calls.inc();
        match self.call_refresh(&refresh_token).await {
            Ok(tokens) => {
                store.set_tokens(&tokens);
                let released = lease.resolve(tokens.access_token.clone());
                info!(released, "Access token refreshed");
                Ok(tokens.access_token)
            }
            Err(e) => {
                metrics().refresh_failures.inc();
                warn!(error = %e, "Token refresh failed, ending session");
                let rejected = lease.reject(SessionEnd::RefreshRejected);
                debug!(rejected, "Queued requests rejected");
                self.end_session();
                Err(Error::Session(SessionEnd::RefreshRejected))
            }
        }
    }

    /// `POST /auth/refresh`, sent straight to the transport so a rejected
    /// refresh can never queue behind itself.
    async fn call_refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let request = ApiRequest::post(REFRESH_ENDPOINT).json(&RefreshRequest {
            refresh_token: refresh_token.to_string(),
        })?;
        let response = self.send_once(&request, None).await?;
        if !response.is_success() {
            return Err(response.into_error(ErrorClass::TokenExpired));
        }
        response.json()
    }

    fn end_session(&self) {
        metrics().forced_logouts.inc();
        self.inner.store.clear_tokens();
        self.inner
            .navigator
            .redirect(LoginRedirect::to(self.inner.policy.login_path.clone()));
    }

    /// Global notice for a failure, unless its class is left to the caller.
    fn surface(&self, error: &Error) {
        let message = match error.class() {
            ErrorClass::Forbidden => NOTICE_FORBIDDEN.to_string(),
            ErrorClass::NotFound => NOTICE_NOT_FOUND.to_string(),
            ErrorClass::Server => NOTICE_SERVER_ERROR.to_string(),
            ErrorClass::OtherHttp => error.detail().unwrap_or(NOTICE_REQUEST_FAILED).to_string(),
            ErrorClass::Network => NOTICE_NETWORK.to_string(),
            ErrorClass::TokenExpired
            | ErrorClass::LoginRejected
            | ErrorClass::BusinessCreate
            | ErrorClass::Validation
            | ErrorClass::Session
            | ErrorClass::Internal => return,
        };
        self.inner.notifier.notify(Notice::error(message));
    }
}
