//! The `{success, code, data, timestamp}` wrapper every non-streaming call
//! returns, and the closed set of outcomes callers see.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ClientError, TransportError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, deserialize_with = "timestamp_text")]
    pub timestamp: Option<String>,
    /// Some handlers report failures here instead of in `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// The backend emits ISO strings from the envelope and epoch millis from a few
// auth responses; both end up as text.
fn timestamp_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

impl Envelope {
    /// Parses a response body. `status` fills in `code` when the body has none.
    pub fn parse(status: u16, body: &[u8]) -> Result<Self, serde_json::Error> {
        let mut envelope: Envelope = serde_json::from_slice(body)?;
        if envelope.code.is_none() {
            envelope.code = Some(i32::from(status));
        }
        Ok(envelope)
    }

    pub fn code(&self) -> i32 {
        self.code.unwrap_or(if self.success { 200 } else { 500 })
    }

    /// Splits into success or business rejection, decoding `data` as `T` on
    /// success. A `data` section that does not fit `T` is a malformed body.
    pub fn into_outcome<T: DeserializeOwned>(self) -> Result<ApiOutcome<T>, ClientError> {
        let code = self.code();
        if !self.success {
            return Ok(ApiOutcome::Rejected(BusinessError::from_envelope(self)));
        }
        let data = serde_json::from_value(self.data)
            .map_err(|e| ClientError::Transport(TransportError::Decode(e.to_string())))?;
        Ok(ApiOutcome::Success {
            code,
            data,
            timestamp: self.timestamp,
        })
    }
}

/// A handled failure reported by the backend (`success = false`). Not a
/// transport failure; returned to the caller as a normal value.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessError {
    pub code: i32,
    pub message: String,
    pub data: Value,
    pub timestamp: Option<String>,
}

impl BusinessError {
    fn from_envelope(envelope: Envelope) -> Self {
        let code = envelope.code();
        let message = match (&envelope.data, &envelope.message) {
            (Value::String(text), _) if !text.is_empty() => text.clone(),
            (_, Some(message)) if !message.is_empty() => message.clone(),
            (Value::Object(map), _) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("request failed with code {code}")),
            _ => format!("request failed with code {code}"),
        };
        Self {
            code,
            message,
            data: envelope.data,
            timestamp: envelope.timestamp,
        }
    }
}

impl std::fmt::Display for BusinessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for BusinessError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome<T> {
    Success {
        code: i32,
        data: T,
        timestamp: Option<String>,
    },
    Rejected(BusinessError),
}

impl<T> ApiOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiOutcome::Success { .. })
    }

    pub fn code(&self) -> i32 {
        match self {
            ApiOutcome::Success { code, .. } => *code,
            ApiOutcome::Rejected(err) => err.code,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ApiOutcome::Success { data, .. } => Some(data),
            ApiOutcome::Rejected(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, BusinessError> {
        match self {
            ApiOutcome::Success { data, .. } => Ok(data),
            ApiOutcome::Rejected(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiOutcome<U> {
        match self {
            ApiOutcome::Success {
                code,
                data,
                timestamp,
            } => ApiOutcome::Success {
                code,
                data: f(data),
                timestamp,
            },
            ApiOutcome::Rejected(err) => ApiOutcome::Rejected(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthPayload;
    use serde_json::json;

    #[test]
    fn success_envelope_decodes_typed_data() {
        let body = json!({
            "success": true,
            "code": 200,
            "data": {"token": "T1", "refreshToken": "R1", "user": {"username": "alice"}},
            "timestamp": "2025-09-21T10:00:00"
        });
        let envelope = Envelope::parse(200, body.to_string().as_bytes()).unwrap();
        let outcome: ApiOutcome<AuthPayload> = envelope.into_outcome().unwrap();

        assert!(outcome.is_success());
        let payload = outcome.data().unwrap();
        assert_eq!(payload.token.as_deref(), Some("T1"));
        assert_eq!(payload.refresh_token.as_deref(), Some("R1"));
        assert_eq!(outcome.code(), 200);
    }

    #[test]
    fn failure_message_comes_from_data_string() {
        let body = br#"{"success":false,"code":400,"data":"username taken","timestamp":"t"}"#;
        let outcome: ApiOutcome<Value> = Envelope::parse(400, body).unwrap().into_outcome().unwrap();
        match outcome {
            ApiOutcome::Rejected(err) => {
                assert_eq!(err.code, 400);
                assert_eq!(err.message, "username taken");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn failure_message_falls_back_to_message_field() {
        let body = br#"{"success":false,"message":"login failed: bad password"}"#;
        let envelope = Envelope::parse(400, body).unwrap();
        assert_eq!(envelope.code(), 400);
        let err = envelope.into_outcome::<Value>().unwrap().into_result().unwrap_err();
        assert_eq!(err.message, "login failed: bad password");
    }

    #[test]
    fn numeric_timestamp_is_kept_as_text() {
        let body = br#"{"success":true,"code":200,"data":null,"timestamp":1726912800000}"#;
        let envelope = Envelope::parse(200, body).unwrap();
        assert_eq!(envelope.timestamp.as_deref(), Some("1726912800000"));
    }

    #[test]
    fn mismatched_data_is_a_decode_error() {
        let body = br#"{"success":true,"code":200,"data":"not a page"}"#;
        let result = Envelope::parse(200, body)
            .unwrap()
            .into_outcome::<crate::models::PageResult<Value>>();
        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::Decode(_)))
        ));
    }

    #[test]
    fn missing_success_flag_is_not_an_envelope() {
        assert!(Envelope::parse(200, br#"{"status":"UP"}"#).is_err());
    }
}
