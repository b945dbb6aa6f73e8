use serde_json::Value;

use crate::client::ApiClient;
use crate::envelope::ApiOutcome;
use crate::error::ClientError;
use crate::models::Dashboard;
use crate::transport::CallDescriptor;

#[derive(Debug, Clone, Copy)]
pub struct SystemApi<'a> {
    client: &'a ApiClient,
}

impl<'a> SystemApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn dashboard(&self) -> Result<ApiOutcome<Dashboard>, ClientError> {
        self.client
            .call(CallDescriptor::get("/system/dashboard"))
            .await
    }

    pub async fn status(&self) -> Result<ApiOutcome<Value>, ClientError> {
        self.client.call(CallDescriptor::get("/system/status")).await
    }
}
