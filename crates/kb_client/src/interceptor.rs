//! Request decoration and response signal extraction.
//!
//! Outbound decoration is an ordered list of pure stages rather than mutable
//! hooks, so the order in which headers are attached is visible in one place.
//! Inbound, [`ResponseSignals::from_headers`] only reads; acting on the
//! signals is the client's job.

use log::warn;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::trace::{system_clock, trace_id_at, Clock};
use crate::transport::CallDescriptor;

/// Canonical spelling `X-Trace-Id`.
pub const TRACE_ID_HEADER: &str = "x-trace-id";
/// Canonical spelling `X-New-Access-Token`.
pub const NEW_ACCESS_TOKEN_HEADER: &str = "x-new-access-token";
/// Canonical spelling `X-Token-Refresh-Needed`.
pub const REFRESH_NEEDED_HEADER: &str = "x-token-refresh-needed";

/// Per-call inputs the stages may read.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub access_token: Option<String>,
    pub trace_id: String,
}

pub type RequestStage = fn(CallDescriptor, &StageContext) -> CallDescriptor;

pub fn attach_authorization(mut call: CallDescriptor, ctx: &StageContext) -> CallDescriptor {
    let Some(token) = ctx.access_token.as_deref() else {
        return call;
    };
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            call.headers.insert(AUTHORIZATION, value);
        }
        Err(_) => warn!("Stored access token is not a valid header value; sending anonymously"),
    }
    call
}

pub fn attach_trace_id(mut call: CallDescriptor, ctx: &StageContext) -> CallDescriptor {
    if let Ok(value) = HeaderValue::from_str(&ctx.trace_id) {
        call.headers.insert(TRACE_ID_HEADER, value);
    }
    call
}

#[derive(Clone)]
pub struct RequestPipeline {
    stages: Vec<(&'static str, RequestStage)>,
    clock: Clock,
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

impl Default for RequestPipeline {
    fn default() -> Self {
        Self::empty()
            .with_stage("authorization", attach_authorization)
            .with_stage("trace-id", attach_trace_id)
    }
}

impl RequestPipeline {
    pub fn empty() -> Self {
        Self {
            stages: Vec::new(),
            clock: system_clock,
        }
    }

    /// Replaces the time source used for trace ids.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the context for one outbound call with a fresh trace id.
    pub fn context(&self, access_token: Option<String>) -> StageContext {
        StageContext {
            access_token,
            trace_id: trace_id_at((self.clock)()),
        }
    }

    pub fn with_stage(mut self, name: &'static str, stage: RequestStage) -> Self {
        self.stages.push((name, stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(name, _)| *name).collect()
    }

    pub fn apply(&self, call: CallDescriptor, ctx: &StageContext) -> CallDescriptor {
        self.stages
            .iter()
            .fold(call, |call, (_, stage)| stage(call, ctx))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSignals {
    pub new_access_token: Option<String>,
    pub refresh_advised: bool,
}

impl ResponseSignals {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let new_access_token = headers
            .get(NEW_ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let refresh_advised = headers
            .get(REFRESH_NEEDED_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "false" | "0"))
            .unwrap_or(false);
        Self {
            new_access_token,
            refresh_advised,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_access_token.is_none() && !self.refresh_advised
    }
}
