//! Call descriptors and the HTTP transport underneath the interceptor chain.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use http::Extensions;
use log::{debug, error, info};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Proxy, Request, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use serde::Serialize;
use serde_json::Value;

use crate::config::{ClientConfig, ProxyAuth};
use crate::error::{ClientError, TransportError};
use crate::interceptor::TRACE_ID_HEADER;

/// What a 401 on this call is allowed to do to the stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Join the shared refresh and re-issue the call once; purge if that fails.
    ///
    /// A 401 that a refresh can cure therefore returns the re-issued
    /// response instead of `AuthenticationExpired`. Only an unrecoverable
    /// 401 clears the stored keys. Use [`AuthPolicy::Purge`] for calls where
    /// any 401 must end the session.
    Recover,
    /// Purge the session and reject.
    Purge,
    /// Reject without touching the session.
    Preserve,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
}

/// One outbound call before and after the request pipeline.
#[derive(Debug, Clone)]
pub struct CallDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub headers: HeaderMap,
    pub auth_policy: AuthPolicy,
}

impl CallDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
            headers: HeaderMap::new(),
            auth_policy: AuthPolicy::Recover,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::InvalidRequest(format!("unserializable body: {e}")))?;
        self.body = Body::Json(value);
        Ok(self)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn policy(mut self, auth_policy: AuthPolicy) -> Self {
        self.auth_policy = auth_policy;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct InboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

pub struct StreamingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a call and buffers the whole body. Bounded by the call timeout.
    async fn send(&self, call: &CallDescriptor) -> Result<InboundResponse, TransportError>;

    /// Sends a call and hands back the body as it arrives. No timeout.
    async fn open_stream(&self, call: &CallDescriptor)
        -> Result<StreamingResponse, TransportError>;
}

fn apply_proxy_auth(proxy: Proxy, auth: Option<&ProxyAuth>) -> Proxy {
    let Some(auth) = auth else {
        return proxy;
    };
    if auth.username.is_empty() {
        return proxy;
    }
    proxy.basic_auth(&auth.username, &auth.password)
}

/// Logs every request leaving the process together with its trace id.
struct CallLogger;

#[async_trait]
impl Middleware for CallLogger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().clone();
        let url = req.url().clone();
        let trace_id = req
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        debug!("Sending {} request to {} [trace {}]", method, url, trace_id);

        let start_time = Instant::now();
        let result = next.run(req, extensions).await;
        match &result {
            Ok(resp) => info!(
                "{} {} -> {} after {:?} [trace {}]",
                method,
                url.path(),
                resp.status(),
                start_time.elapsed(),
                trace_id
            ),
            Err(e) => error!(
                "{} {} failed after {:?} [trace {}]: {}",
                method,
                url.path(),
                start_time.elapsed(),
                trace_id,
                e
            ),
        }
        result
    }
}

/// Production transport over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Self::build_http_client(config)?;
        Ok(Self {
            client: ClientBuilder::new(client).with(CallLogger).build(),
            config: config.clone(),
        })
    }

    fn build_http_client(config: &ClientConfig) -> Result<Client, ClientError> {
        // Proxies come from the config only; its loader already reads HTTP(S)_PROXY.
        let mut builder = Client::builder()
            .no_proxy()
            .default_headers(Self::default_headers());
        if !config.http_proxy.is_empty() {
            let proxy = Proxy::http(&config.http_proxy)
                .map_err(|e| ClientError::InvalidRequest(format!("bad http proxy: {e}")))?;
            builder = builder.proxy(apply_proxy_auth(proxy, config.http_proxy_auth.as_ref()));
        }
        if !config.https_proxy.is_empty() {
            let proxy = Proxy::https(&config.https_proxy)
                .map_err(|e| ClientError::InvalidRequest(format!("bad https proxy: {e}")))?;
            builder = builder.proxy(apply_proxy_auth(proxy, config.https_proxy_auth.as_ref()));
        }
        builder
            .build()
            .map_err(|e| ClientError::Transport(TransportError::from(e)))
    }

    pub fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn request(&self, call: &CallDescriptor) -> reqwest_middleware::RequestBuilder {
        let mut builder = self
            .client
            .request(call.method.clone(), self.config.endpoint_url(&call.path))
            .headers(call.headers.clone());
        if !call.query.is_empty() {
            builder = builder.query(&call.query);
        }
        if let Body::Json(value) = &call.body {
            builder = builder.json(value);
        }
        builder
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, call: &CallDescriptor) -> Result<InboundResponse, TransportError> {
        let response = self.request(call).timeout(self.config.request_timeout()).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(InboundResponse {
            status,
            headers,
            body,
        })
    }

    async fn open_stream(
        &self,
        call: &CallDescriptor,
    ) -> Result<StreamingResponse, TransportError> {
        let response = self
            .request(call)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed();
        Ok(StreamingResponse {
            status,
            headers,
            body,
        })
    }
}
