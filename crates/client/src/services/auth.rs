//! Login, logout and session bootstrap.

use desk_core::{Error, LoginPayload, MeResponse, Result, TokenResponse};
use tracing::{info, warn};
use validator::Validate;

use crate::api::ApiClient;
use crate::cache::QueryCache;
use crate::transport::ApiRequest;

#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    cache: QueryCache,
}

impl AuthService {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    /// Log in and load the identity snapshot.
    ///
    /// A wrong password comes back as an `AUTH_LOGIN` error with no global
    /// notice; the caller renders it next to the form.
    ///
    /// `initializing` is cleared on every exit so the route guard never
    /// stays pending after a failed attempt.
    pub async fn login(&self, payload: &LoginPayload) -> Result<MeResponse> {
        let outcome = self.login_inner(payload).await;
        self.client.store().set_initializing(false);
        outcome
    }

    async fn login_inner(&self, payload: &LoginPayload) -> Result<MeResponse> {
        payload.validate()?;

        let tokens: TokenResponse = self
            .client
            .fetch(ApiRequest::post("/auth/login").json(payload)?)
            .await?;
        self.client.store().set_tokens(&tokens);

        let me = self.me().await?;
        info!(user = %me.user.identifier(), "Logged in");
        Ok(me)
    }

    /// Fetch `/auth/me` and store the result.
    pub async fn me(&self) -> Result<MeResponse> {
        let me: MeResponse = self.client.fetch(ApiRequest::get("/auth/me")).await?;
        self.client.store().set_session(me.clone());
        Ok(me)
    }

    /// Tell the server, then drop the session whatever it said.
    pub async fn logout(&self) {
        if self.client.store().is_authenticated() {
            if let Err(e) = self.client.execute(ApiRequest::post("/auth/logout")).await {
                warn!(error = %e, "Server-side logout failed, clearing local session anyway");
            }
        }
        self.client.store().clear_tokens();
        self.cache.clear();
        info!("Logged out");
    }

    /// Load the persisted session and revalidate it against the server.
    ///
    /// Returns whether the user ends up authenticated. `initializing` is
    /// cleared whatever happens.
    pub async fn restore(&self) -> Result<bool> {
        let store = self.client.store();
        let outcome = self.restore_inner().await;
        store.set_initializing(false);
        outcome
    }

    async fn restore_inner(&self) -> Result<bool> {
        let store = self.client.store();
        if !store.restore()? {
            return Ok(false);
        }
        match self.me().await {
            Ok(_) => Ok(true),
            Err(Error::Session(reason)) => {
                info!(%reason, "Persisted session could not be renewed");
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "Failed to revalidate persisted session");
                Ok(store.is_authenticated())
            }
        }
    }
}
