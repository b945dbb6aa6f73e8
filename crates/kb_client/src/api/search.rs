use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::envelope::ApiOutcome;
use crate::error::ClientError;
use crate::models::{PageResult, QuestionRequest, SearchRequest, SearchResult, SearchType};
use crate::stream::{StreamHandler, StreamSummary};
use crate::transport::CallDescriptor;

#[derive(Debug, Clone, Copy)]
pub struct SearchApi<'a> {
    client: &'a ApiClient,
}

impl<'a> SearchApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<ApiOutcome<PageResult<SearchResult>>, ClientError> {
        self.client
            .call(CallDescriptor::post("/search").json(request)?)
            .await
    }

    pub async fn simple(
        &self,
        query: &str,
        search_type: SearchType,
        page: u32,
        size: u32,
    ) -> Result<ApiOutcome<PageResult<SearchResult>>, ClientError> {
        let call = CallDescriptor::get("/search/simple")
            .query("query", query)
            .query("type", search_type.as_str())
            .query("page", page)
            .query("size", size);
        self.client.call(call).await
    }

    /// Non-streaming question answering; `data` carries the answer and its
    /// sources.
    pub async fn ask(&self, request: &QuestionRequest) -> Result<ApiOutcome<Value>, ClientError> {
        self.client
            .call(CallDescriptor::post("/search/ask").json(request)?)
            .await
    }

    pub async fn ask_streaming(
        &self,
        request: &QuestionRequest,
        handler: &mut dyn StreamHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, ClientError> {
        let call = CallDescriptor::post("/search/ask/streaming").json(request)?;
        self.client.stream(call, handler, cancel).await
    }
}
