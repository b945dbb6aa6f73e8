//! Actuator endpoints. These answer with bare JSON, not the envelope.

use serde_json::Value;

use super::bare_json_outcome;
use crate::client::ApiClient;
use crate::envelope::ApiOutcome;
use crate::error::ClientError;
use crate::transport::CallDescriptor;

#[derive(Debug, Clone, Copy)]
pub struct HealthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> HealthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn health(&self) -> Result<ApiOutcome<Value>, ClientError> {
        self.fetch("/actuator/health".to_string()).await
    }

    pub async fn info(&self) -> Result<ApiOutcome<Value>, ClientError> {
        self.fetch("/actuator/info".to_string()).await
    }

    /// All metric names, or one metric's measurements when `name` is given.
    pub async fn metrics(&self, name: Option<&str>) -> Result<ApiOutcome<Value>, ClientError> {
        let path = match name {
            Some(name) => format!("/actuator/metrics/{name}"),
            None => "/actuator/metrics".to_string(),
        };
        self.fetch(path).await
    }

    async fn fetch(&self, path: String) -> Result<ApiOutcome<Value>, ClientError> {
        bare_json_outcome(self.client.call_raw(CallDescriptor::get(path)).await?)
    }
}
