//! JSON bodies exchanged between the gateway and the invocation entrypoint.

use serde::{Deserialize, Serialize};

use crate::{Turn, UsageStats};

/// Request sent by the gateway. Both fields are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub model: String,
    pub messages: Vec<Turn>,
}

/// Request as accepted by the entrypoint, where both fields may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationPayload {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Turn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
}

impl InvocationResponse {
    /// Usage with absent counters defaulted to 0.
    pub fn usage_or_zero(&self) -> UsageStats {
        self.usage.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Provider,
}

/// Body of a non-success reply from the invocation server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn test_response_without_usage() {
        let response: InvocationResponse =
            serde_json::from_str(r#"{"response": "Hi there!"}"#).unwrap();
        assert_eq!(response.response, "Hi there!");
        assert!(response.usage_or_zero().is_zero());

        let null_usage: InvocationResponse =
            serde_json::from_str(r#"{"response": "Hi", "usage": null}"#).unwrap();
        assert!(null_usage.usage.is_none());
    }

    #[test]
    fn test_response_requires_response_field() {
        let result = serde_json::from_str::<InvocationResponse>(r#"{"usage": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_payload_defaults() {
        let payload: InvocationPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload, InvocationPayload::default());

        let payload: InvocationPayload = serde_json::from_str(
            r#"{"messages": [{"role": "user", "content": "Hello"}]}"#,
        )
        .unwrap();
        assert!(payload.model.is_none());
        assert_eq!(payload.messages, vec![Turn::new(Role::User, "Hello")]);
    }

    #[test]
    fn test_payload_rejects_unknown_role() {
        let result = serde_json::from_str::<InvocationPayload>(
            r#"{"messages": [{"role": "model", "content": "Hello"}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = InvocationRequest {
            model: "gemini-2.5-flash-lite".into(),
            messages: vec![Turn::new(Role::User, "Hello")],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model": "gemini-2.5-flash-lite",
                "messages": [{"role": "user", "content": "Hello"}]
            })
        );
    }
}
