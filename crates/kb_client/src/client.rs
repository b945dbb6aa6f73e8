//! The client object every endpoint module goes through.
//!
//! A call runs: request pipeline → transport → response signals →
//! authentication-failure policy → envelope. Streaming calls share the first
//! three steps and then hand the raw body to the frame decoder.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::auth::RefreshGate;
use crate::config::ClientConfig;
use crate::envelope::{ApiOutcome, Envelope};
use crate::error::{ClientError, TransportError};
use crate::interceptor::{RequestPipeline, ResponseSignals};
use crate::invalidator::SessionInvalidator;
use crate::masking::mask_token;
use crate::session::SessionVault;
use crate::store::{CredentialStore, FileStore, MemoryStore};
use crate::stream::{run_stream, StreamHandler, StreamSummary};
use crate::transport::{
    AuthPolicy, ByteStream, CallDescriptor, HttpTransport, InboundResponse, Transport,
};

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) vault: SessionVault,
    pub(crate) invalidator: SessionInvalidator,
    pub(crate) pipeline: RequestPipeline,
    pub(crate) refresh_gate: RefreshGate,
}

/// Cheap to clone; clones share the session, the transport and the in-flight
/// refresh.
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) inner: Arc<ClientInner>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("session", &self.inner.vault)
            .field("pipeline", &self.inner.pipeline)
            .finish()
    }
}

impl ApiClient {
    /// Builds the production client: HTTP transport plus a file-backed store
    /// when `storage_path` is set, an in-memory one otherwise.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        let store: Arc<dyn CredentialStore> = match &config.storage_path {
            Some(path) => Arc::new(FileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::with_parts(config, transport, store))
    }

    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self::with_pipeline(config, transport, store, RequestPipeline::default())
    }

    pub fn with_pipeline(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        pipeline: RequestPipeline,
    ) -> Self {
        let vault = SessionVault::new(store);
        let invalidator = SessionInvalidator::new(vault.clone());
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                vault,
                invalidator,
                pipeline,
                refresh_gate: RefreshGate::default(),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// A handle whose calls fail with [`ClientError::Cancelled`] once `cancel`
    /// fires. The session and in-flight refresh stay shared.
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cancel,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionVault {
        &self.inner.vault
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.vault.access_token().is_some()
    }

    /// Dispatches `call` and unwraps the envelope into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        call: CallDescriptor,
    ) -> Result<ApiOutcome<T>, ClientError> {
        let response = self.call_raw(call).await?;
        unwrap_envelope(response)
    }

    /// Dispatches `call` without envelope handling. Non-2xx responses are
    /// still returned; only a 401 is acted upon.
    pub async fn call_raw(&self, call: CallDescriptor) -> Result<InboundResponse, ClientError> {
        let inner = Arc::clone(&self.inner);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            result = inner.execute(call) => result,
        }
    }

    /// Opens a streaming call and decodes it into `handler`. Errors before
    /// the body starts are returned; errors after reach `handler.on_error`.
    /// A 401 here purges the session without attempting a refresh.
    pub async fn stream(
        &self,
        call: CallDescriptor,
        handler: &mut dyn StreamHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, ClientError> {
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = self.cancel.cancelled() => return Err(ClientError::Cancelled),
            result = self.inner.open_stream(call) => result?,
        };
        Ok(run_stream(body, handler, cancel).await)
    }
}

/// Turns a buffered response into an outcome. A non-2xx body that is still
/// an envelope is a business outcome.
pub(crate) fn unwrap_envelope<T: DeserializeOwned>(
    response: InboundResponse,
) -> Result<ApiOutcome<T>, ClientError> {
    let status = response.status;
    match Envelope::parse(status.as_u16(), &response.body) {
        Ok(envelope) => envelope.into_outcome(),
        Err(err) if status.is_success() => {
            Err(ClientError::Transport(TransportError::Decode(err.to_string())))
        }
        Err(_) => Err(http_error(&response)),
    }
}

pub(crate) fn http_error(response: &InboundResponse) -> ClientError {
    ClientError::Http {
        status: response.status.as_u16(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
    }
}

impl ClientInner {
    fn effective_policy(&self, policy: AuthPolicy) -> AuthPolicy {
        match policy {
            AuthPolicy::Recover if !self.config.refresh_on_unauthorized => AuthPolicy::Purge,
            other => other,
        }
    }

    /// Runs the pipeline and sends once. Returns the response with the access
    /// token that was attached.
    pub(crate) async fn send_decorated(
        &self,
        call: &CallDescriptor,
    ) -> Result<(InboundResponse, Option<String>), ClientError> {
        let ctx = self.pipeline.context(self.vault.access_token());
        let decorated = self.pipeline.apply(call.clone(), &ctx);
        let response = self.transport.send(&decorated).await?;
        Ok((response, ctx.access_token))
    }

    async fn execute(self: Arc<Self>, call: CallDescriptor) -> Result<InboundResponse, ClientError> {
        let epoch = self.vault.epoch();
        let (response, sent_token) = self.send_decorated(&call).await?;
        self.absorb_signals(&response);
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        match self.effective_policy(call.auth_policy) {
            AuthPolicy::Preserve => Err(http_error(&response)),
            AuthPolicy::Purge => Err(self.expire(&call, None)),
            AuthPolicy::Recover => {
                if let Err(err) = self.recover(sent_token.as_deref()).await {
                    warn!("Could not recover from 401 on {}: {}", call.path, err);
                    return Err(self.expire(&call, Some(epoch)));
                }
                let (retry, _) = self.send_decorated(&call).await?;
                self.absorb_signals(&retry);
                if retry.status == StatusCode::UNAUTHORIZED {
                    return Err(self.expire(&call, Some(epoch)));
                }
                Ok(retry)
            }
        }
    }

    /// Makes a fresh credential available for a re-issue. If another caller
    /// already rotated the token this call was sent with, nothing is done.
    async fn recover(self: &Arc<Self>, sent_token: Option<&str>) -> Result<(), ClientError> {
        if let Some(current) = self.vault.access_token() {
            if sent_token != Some(current.as_str()) {
                debug!("Access token already rotated to {}", mask_token(&current));
                return Ok(());
            }
        }
        self.refresh().await.map(|_| ())
    }

    /// Purges and reports expiry. With `epoch` set, a session started after
    /// that point is left alone.
    fn expire(&self, call: &CallDescriptor, epoch: Option<u64>) -> ClientError {
        let reason = format!("401 on {} {}", call.method, call.path);
        let purged = match epoch {
            Some(epoch) => self.invalidator.purge_within(epoch, &reason),
            None => self.invalidator.purge(&reason),
        };
        if let Err(err) = purged {
            warn!("Failed to purge session after {}: {}", reason, err);
        }
        ClientError::AuthenticationExpired
    }

    fn absorb_signals(self: &Arc<Self>, response: &InboundResponse) {
        let signals = ResponseSignals::from_headers(&response.headers);
        if signals.is_empty() {
            return;
        }
        if let Some(token) = signals.new_access_token {
            match self.vault.replace_access_token(&token) {
                Ok(true) => debug!("Stored rotated access token {}", mask_token(&token)),
                Ok(false) => debug!("Ignoring rotated access token without a session"),
                Err(err) => warn!("Failed to store rotated access token: {}", err),
            }
        }
        if signals.refresh_advised {
            self.refresh_in_background();
        }
    }

    async fn open_stream(self: &Arc<Self>, call: CallDescriptor) -> Result<ByteStream, ClientError> {
        let ctx = self.pipeline.context(self.vault.access_token());
        let decorated = self.pipeline.apply(call, &ctx);
        let response = self.transport.open_stream(&decorated).await?;

        let signals_only = InboundResponse {
            status: response.status,
            headers: response.headers,
            body: Bytes::new(),
        };
        self.absorb_signals(&signals_only);

        if response.status == StatusCode::UNAUTHORIZED {
            return Err(self.expire(&decorated, None));
        }
        if !response.status.is_success() {
            let mut body = Vec::new();
            let mut stream = response.body;
            while let Some(chunk) = stream.next().await {
                body.extend_from_slice(&chunk?);
            }
            return Err(http_error(&InboundResponse {
                body: Bytes::from(body),
                ..signals_only
            }));
        }
        Ok(response.body)
    }
}
