//! Token lifecycle: login, registration, single-flight refresh and logout.
//!
//! At most one refresh exchange runs at a time. The exchange is spawned onto
//! the runtime so it completes even if every waiter is dropped, and it
//! removes itself from the gate when it settles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::client::{unwrap_envelope, ApiClient, ClientInner};
use crate::envelope::ApiOutcome;
use crate::error::{ClientError, TransportError};
use crate::masking::mask_token;
use crate::models::{
    AuthPayload, ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest, UserProfile,
};
use crate::session::CredentialPair;
use crate::transport::{AuthPolicy, CallDescriptor};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";
const PROFILE_PATH: &str = "/auth/profile";
const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";

pub(crate) type RefreshOutcome = Result<CredentialPair, ClientError>;
type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Default)]
pub(crate) struct RefreshGate {
    in_flight: Arc<Mutex<Option<(u64, PendingRefresh)>>>,
    generation: AtomicU64,
}

impl RefreshGate {
    /// Returns the in-flight refresh, or starts `start()` as the new one.
    async fn join_or_start<F>(&self, start: F) -> PendingRefresh
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let mut slot = self.in_flight.lock().await;
        if let Some((_, pending)) = slot.as_ref() {
            debug!("Joining in-flight token refresh");
            return pending.clone();
        }

        let id = self.generation.fetch_add(1, Ordering::Relaxed);
        let work = start();
        let gate = Arc::clone(&self.in_flight);
        let task = tokio::spawn(async move {
            let outcome = work.await;
            let mut slot = gate.lock().await;
            if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
                *slot = None;
            }
            outcome
        });
        let pending = async move {
            task.await.unwrap_or_else(|err| {
                Err(ClientError::Transport(TransportError::Request(format!(
                    "refresh task failed: {err}"
                ))))
            })
        }
        .boxed()
        .shared();

        *slot = Some((id, pending.clone()));
        pending
    }

    pub(crate) async fn is_in_flight(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }
}

impl ClientInner {
    /// Joins or starts the shared refresh and waits for its outcome.
    pub(crate) async fn refresh(self: &Arc<Self>) -> RefreshOutcome {
        let inner = Arc::clone(self);
        let pending = self
            .refresh_gate
            .join_or_start(move || inner.exchange_refresh().boxed())
            .await;
        pending.await
    }

    pub(crate) fn refresh_in_background(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            match inner.refresh().await {
                Ok(_) => debug!("Proactive token refresh finished"),
                Err(err) => warn!("Proactive token refresh failed: {}", err),
            }
        });
    }

    // The exchange belongs to the session that was current when it started.
    // If that session is purged or replaced meanwhile, nothing is written.
    async fn exchange_refresh(self: Arc<Self>) -> RefreshOutcome {
        let epoch = self.vault.epoch();
        let outcome = self.try_exchange_refresh(epoch).await;
        match &outcome {
            Ok(pair) => info!(
                "Access token refreshed: {}",
                mask_token(&pair.access_token)
            ),
            Err(err) => {
                warn!("Token refresh failed: {}", err);
                if let Err(store_err) = self.invalidator.purge_within(epoch, "token refresh failed")
                {
                    warn!("Failed to purge session after refresh failure: {}", store_err);
                }
            }
        }
        outcome
    }

    // Response signals are not absorbed for the exchange itself.
    async fn try_exchange_refresh(&self, epoch: u64) -> RefreshOutcome {
        let refresh_token = self
            .vault
            .refresh_token()
            .ok_or(ClientError::MissingRefreshToken)?;
        let call = CallDescriptor::post(REFRESH_PATH)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })?
            .policy(AuthPolicy::Purge);

        let (response, _) = self.send_decorated(&call).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthenticationExpired);
        }

        let pair = match unwrap_envelope::<AuthPayload>(response)? {
            ApiOutcome::Success {
                data:
                    AuthPayload {
                        token: Some(token),
                        refresh_token: rotated,
                        ..
                    },
                ..
            } if !token.trim().is_empty() => {
                // Servers that do not rotate refresh tokens omit the field.
                let refresh = rotated
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or(refresh_token);
                CredentialPair::new(token, Some(refresh))
            }
            ApiOutcome::Success { code, .. } => {
                return Err(ClientError::RefreshRejected {
                    code,
                    message: "refresh response carried no access token".to_string(),
                })
            }
            ApiOutcome::Rejected(err) => {
                return Err(ClientError::RefreshRejected {
                    code: err.code,
                    message: err.message,
                })
            }
        };
        if !self.vault.replace_pair_within(epoch, &pair)? {
            debug!("Discarding refreshed tokens for a session that has ended");
            return Err(ClientError::AuthenticationExpired);
        }
        Ok(pair)
    }
}

/// Account operations. Obtained from [`ApiClient::auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi { client: self }
    }
}

impl<'a> AuthApi<'a> {
    /// Logs in and, on success with a token, stores the pair and profile in
    /// one batch. A failed login leaves any existing session untouched.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ApiOutcome<AuthPayload>, ClientError> {
        let call = CallDescriptor::post(LOGIN_PATH)
            .json(&LoginRequest { username, password })?
            .policy(AuthPolicy::Preserve);
        let outcome = self.client.call::<AuthPayload>(call).await?;
        self.store_session(&outcome, username)?;
        Ok(outcome)
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<ApiOutcome<AuthPayload>, ClientError> {
        let call = CallDescriptor::post(REGISTER_PATH)
            .json(&RegisterRequest {
                username,
                password,
                email,
            })?
            .policy(AuthPolicy::Preserve);
        let outcome = self.client.call::<AuthPayload>(call).await?;
        self.store_session(&outcome, username)?;
        Ok(outcome)
    }

    fn store_session(
        &self,
        outcome: &ApiOutcome<AuthPayload>,
        username: &str,
    ) -> Result<(), ClientError> {
        let Some(payload) = outcome.data() else {
            debug!("Authentication for {} was rejected; session unchanged", username);
            return Ok(());
        };
        let Some(token) = payload.token.as_deref().filter(|t| !t.trim().is_empty()) else {
            warn!("Authentication for {} succeeded without a token", username);
            return Ok(());
        };
        let pair = CredentialPair::new(token, payload.refresh_token.clone());
        self.client
            .session()
            .save_session(&pair, payload.user.as_ref())?;
        info!(
            "Signed in as {} with token {}",
            username,
            mask_token(&pair.access_token)
        );
        Ok(())
    }

    /// Exchanges the stored refresh token for a new pair. Concurrent callers
    /// share one exchange. Any failure purges the session.
    pub async fn refresh(&self) -> Result<CredentialPair, ClientError> {
        self.client.inner.refresh().await
    }

    pub async fn refresh_in_flight(&self) -> bool {
        self.client.inner.refresh_gate.is_in_flight().await
    }

    /// Best-effort server notification followed by an unconditional purge.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let notified = self
            .client
            .call::<Value>(CallDescriptor::post(LOGOUT_PATH).policy(AuthPolicy::Purge))
            .await;
        match &notified {
            Ok(outcome) if outcome.is_success() => debug!("Server acknowledged logout"),
            Ok(outcome) => debug!("Server rejected logout with code {}", outcome.code()),
            Err(err) => debug!("Logout notification failed: {}", err),
        }
        self.client.inner.invalidator.purge("logout")?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<ApiOutcome<UserProfile>, ClientError> {
        let outcome = self
            .client
            .call::<UserProfile>(CallDescriptor::get(PROFILE_PATH))
            .await?;
        if let Some(profile) = outcome.data() {
            if let Err(err) = self.client.session().set_identity(profile) {
                warn!("Failed to cache profile snapshot: {}", err);
            }
        }
        Ok(outcome)
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<ApiOutcome<Value>, ClientError> {
        let call = CallDescriptor::put(CHANGE_PASSWORD_PATH).json(&ChangePasswordRequest {
            old_password,
            new_password,
        })?;
        self.client.call(call).await
    }

    /// Cached profile from the last login or profile fetch. Display only.
    pub fn local_identity(&self) -> Option<UserProfile> {
        self.client.session().identity()
    }
}
