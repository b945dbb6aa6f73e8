//! Typed call sites, one module per backend resource.

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{http_error, unwrap_envelope, ApiClient};
use crate::envelope::ApiOutcome;
use crate::error::{ClientError, TransportError};
use crate::transport::InboundResponse;

pub mod conversations;
pub mod documents;
pub mod health;
pub mod search;
pub mod system;
pub mod vectors;

pub use conversations::ConversationsApi;
pub use documents::{DocumentsApi, DownloadedFile};
pub use health::HealthApi;
pub use search::SearchApi;
pub use system::SystemApi;
pub use vectors::VectorsApi;

impl ApiClient {
    pub fn documents(&self) -> DocumentsApi<'_> {
        DocumentsApi::new(self)
    }

    pub fn search(&self) -> SearchApi<'_> {
        SearchApi::new(self)
    }

    pub fn vectors(&self) -> VectorsApi<'_> {
        VectorsApi::new(self)
    }

    pub fn conversations(&self) -> ConversationsApi<'_> {
        ConversationsApi::new(self)
    }

    pub fn system(&self) -> SystemApi<'_> {
        SystemApi::new(self)
    }

    pub fn health(&self) -> HealthApi<'_> {
        HealthApi::new(self)
    }
}

fn is_json(response: &InboundResponse) -> bool {
    response
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("json"))
        .unwrap_or(false)
}

/// For handlers that put extra fields beside `data` at the top level: the
/// envelope decides the outcome, the whole body is decoded as `T`.
fn flattened_outcome<T: DeserializeOwned>(
    response: InboundResponse,
) -> Result<ApiOutcome<T>, ClientError> {
    let body = response.body.clone();
    match unwrap_envelope::<Value>(response)? {
        ApiOutcome::Success {
            code, timestamp, ..
        } => {
            let data = serde_json::from_slice(&body)
                .map_err(|e| ClientError::Transport(TransportError::Decode(e.to_string())))?;
            Ok(ApiOutcome::Success {
                code,
                data,
                timestamp,
            })
        }
        ApiOutcome::Rejected(err) => Ok(ApiOutcome::Rejected(err)),
    }
}

/// For endpoints that answer with bare JSON (no envelope). Any status with a
/// JSON body is a readable answer; actuator reports `DOWN` with a 503.
fn bare_json_outcome(response: InboundResponse) -> Result<ApiOutcome<Value>, ClientError> {
    match serde_json::from_slice::<Value>(&response.body) {
        Ok(data) => Ok(ApiOutcome::Success {
            code: i32::from(response.status.as_u16()),
            data,
            timestamp: None,
        }),
        Err(err) if response.status.is_success() => {
            Err(ClientError::Transport(TransportError::Decode(err.to_string())))
        }
        Err(_) => Err(http_error(&response)),
    }
}
