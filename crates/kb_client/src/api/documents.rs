use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde_json::Value;

use super::is_json;
use crate::client::{http_error, unwrap_envelope, ApiClient};
use crate::envelope::ApiOutcome;
use crate::error::ClientError;
use crate::models::{DocumentInfo, PageResult};
use crate::transport::CallDescriptor;

/// A downloaded document body.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> DocumentsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(
        &self,
        page: u32,
        size: u32,
        keyword: Option<&str>,
    ) -> Result<ApiOutcome<PageResult<DocumentInfo>>, ClientError> {
        let call = CallDescriptor::get("/documents")
            .query("page", page)
            .query("size", size)
            .query_opt("keyword", keyword.filter(|k| !k.trim().is_empty()));
        self.client.call(call).await
    }

    pub async fn get(&self, id: &str) -> Result<ApiOutcome<DocumentInfo>, ClientError> {
        self.client
            .call(CallDescriptor::get(format!("/documents/{id}")))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<ApiOutcome<Value>, ClientError> {
        self.client
            .call(CallDescriptor::delete(format!("/documents/{id}")))
            .await
    }

    /// Fetches the raw file. The server answers failures with a JSON
    /// envelope instead of the file, which comes back as a rejection.
    pub async fn download(&self, id: &str) -> Result<ApiOutcome<DownloadedFile>, ClientError> {
        let response = self
            .client
            .call_raw(CallDescriptor::get(format!("/documents/{id}/download")))
            .await?;

        if is_json(&response) {
            return match unwrap_envelope::<Value>(response)? {
                ApiOutcome::Rejected(err) => Ok(ApiOutcome::Rejected(err)),
                ApiOutcome::Success { .. } => Err(ClientError::InvalidRequest(format!(
                    "download of {id} returned JSON instead of a file"
                ))),
            };
        }
        if !response.status.is_success() {
            return Err(http_error(&response));
        }

        let file_name =
            header_text(&response.headers, CONTENT_DISPOSITION).and_then(|v| attachment_name(&v));
        let content_type = header_text(&response.headers, CONTENT_TYPE);
        Ok(ApiOutcome::Success {
            code: i32::from(response.status.as_u16()),
            data: DownloadedFile {
                file_name,
                content_type,
                bytes: response.body,
            },
            timestamp: None,
        })
    }
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `attachment; filename="a.pdf"` → `a.pdf`. Prefers the RFC 5987
/// `filename*` form when it is plain UTF-8 without escapes.
fn attachment_name(disposition: &str) -> Option<String> {
    let mut plain = None;
    for part in disposition.split(';').map(str::trim) {
        if let Some(value) = part.strip_prefix("filename*=") {
            if let Some(name) = value.strip_prefix("UTF-8''") {
                if !name.contains('%') {
                    return Some(name.to_string());
                }
            }
        } else if let Some(value) = part.strip_prefix("filename=") {
            plain = Some(value.trim_matches('"').to_string());
        }
    }
    plain.filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_name_variants() {
        assert_eq!(
            attachment_name(r#"attachment; filename="report.pdf""#).as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            attachment_name("attachment; filename=a.txt; filename*=UTF-8''b.txt").as_deref(),
            Some("b.txt")
        );
        assert_eq!(attachment_name("inline"), None);
    }
}
