use serde_json::Value;

use crate::client::ApiClient;
use crate::envelope::ApiOutcome;
use crate::error::ClientError;
use crate::models::{PageResult, SortDirection, VectorData};
use crate::transport::CallDescriptor;

pub const DEFAULT_SORT_FIELD: &str = "createdTime";

#[derive(Debug, Clone, Copy)]
pub struct VectorsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> VectorsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(
        &self,
        page: u32,
        size: u32,
        sort_by: Option<&str>,
        sort_dir: SortDirection,
    ) -> Result<ApiOutcome<PageResult<VectorData>>, ClientError> {
        let call = CallDescriptor::get("/vector-data")
            .query("page", page)
            .query("size", size)
            .query("sortBy", sort_by.unwrap_or(DEFAULT_SORT_FIELD))
            .query("sortDir", sort_dir.as_str());
        self.client.call(call).await
    }

    pub async fn stats(&self) -> Result<ApiOutcome<Value>, ClientError> {
        self.client
            .call(CallDescriptor::get("/vector-data/stats"))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<ApiOutcome<Value>, ClientError> {
        self.client
            .call(CallDescriptor::delete(format!("/vector-data/{id}")))
            .await
    }
}
