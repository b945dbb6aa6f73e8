use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::flattened_outcome;
use crate::client::ApiClient;
use crate::envelope::ApiOutcome;
use crate::error::ClientError;
use crate::models::{
    Conversation, ConversationAnswer, ConversationAskRequest, ConversationMessage, PageResult,
};
use crate::stream::{StreamHandler, StreamSummary};
use crate::transport::CallDescriptor;

#[derive(Debug, Clone, Copy)]
pub struct ConversationsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ConversationsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// The list handler reports paging beside `data` rather than inside it.
    pub async fn list(
        &self,
        page: u32,
        size: u32,
    ) -> Result<ApiOutcome<PageResult<Conversation>>, ClientError> {
        let call = CallDescriptor::get("/conversation/list")
            .query("page", page)
            .query("size", size);
        flattened_outcome(self.client.call_raw(call).await?)
    }

    pub async fn create(&self) -> Result<ApiOutcome<Conversation>, ClientError> {
        let call = CallDescriptor::post("/conversation/create").json(&json!({}))?;
        self.client.call(call).await
    }

    pub async fn get(&self, id: i64) -> Result<ApiOutcome<Conversation>, ClientError> {
        self.client
            .call(CallDescriptor::get(format!("/conversation/{id}")))
            .await
    }

    pub async fn messages(
        &self,
        id: i64,
    ) -> Result<ApiOutcome<Vec<ConversationMessage>>, ClientError> {
        self.client
            .call(CallDescriptor::get(format!("/conversation/{id}/messages")))
            .await
    }

    pub async fn ask(
        &self,
        request: &ConversationAskRequest,
    ) -> Result<ApiOutcome<ConversationAnswer>, ClientError> {
        self.client
            .call(CallDescriptor::post("/conversation/ask").json(request)?)
            .await
    }

    pub async fn ask_streaming(
        &self,
        request: &ConversationAskRequest,
        handler: &mut dyn StreamHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, ClientError> {
        let call = CallDescriptor::post("/conversation/ask/streaming").json(request)?;
        self.client.stream(call, handler, cancel).await
    }

    pub async fn delete(&self, id: i64) -> Result<ApiOutcome<Value>, ClientError> {
        self.client
            .call(CallDescriptor::delete(format!("/conversation/{id}")))
            .await
    }

    pub async fn rename(&self, id: i64, title: &str) -> Result<ApiOutcome<Value>, ClientError> {
        let call =
            CallDescriptor::put(format!("/conversation/{id}")).json(&json!({ "title": title }))?;
        self.client.call(call).await
    }

    pub async fn stats(&self) -> Result<ApiOutcome<Value>, ClientError> {
        self.client
            .call(CallDescriptor::get("/conversation/stats"))
            .await
    }
}
