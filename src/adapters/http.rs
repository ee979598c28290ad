use crate::utils::error::{RemoteSystem, Result, SyncError};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const MAX_MESSAGE_LEN: usize = 300;

/// A remote answer, decoded before anyone looks at its fields.
#[derive(Debug)]
pub enum RemoteReply<T> {
    Success(T),
    Failure { status: StatusCode, message: String },
}

impl<T: DeserializeOwned> RemoteReply<T> {
    pub async fn read(response: Response, system: RemoteSystem) -> Result<Self> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::transport(system, e))?;

        if !status.is_success() {
            return Ok(RemoteReply::Failure {
                status,
                message: failure_message(&body),
            });
        }

        match serde_json::from_str::<T>(&body) {
            Ok(payload) => Ok(RemoteReply::Success(payload)),
            Err(e) => Ok(RemoteReply::Failure {
                status,
                message: format!("unexpected response body: {}", e),
            }),
        }
    }
}

impl<T> RemoteReply<T> {
    pub fn into_result(self, system: RemoteSystem, operation: &str) -> Result<T> {
        match self {
            RemoteReply::Success(payload) => Ok(payload),
            RemoteReply::Failure { status, message } => Err(SyncError::rejection(
                system,
                operation,
                status.as_u16().to_string(),
                message,
            )),
        }
    }
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SyncError::ConfigError {
            message: format!("Failed to build HTTP client: {}", e),
        })
}

/// Prefers a JSON `message` (top level or first `data` entry), falling back
/// to the truncated raw body.
fn failure_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.pointer("/data/0/message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.is_empty() {
        return "no response body".to_string();
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        let truncated: String = message.chars().take(MAX_MESSAGE_LEN).collect();
        return format!("{}...", truncated);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_prefers_json_message() {
        let body = r#"{"code":"INVALID_DATA","message":"invalid data","status":"error"}"#;
        assert_eq!(failure_message(body), "invalid data");
    }

    #[test]
    fn test_failure_message_from_first_data_entry() {
        let body = r#"{"data":[{"code":"MANDATORY_NOT_FOUND","message":"required field not found","status":"error"}]}"#;
        assert_eq!(failure_message(body), "required field not found");
    }

    #[test]
    fn test_failure_message_plain_text_and_empty() {
        assert_eq!(failure_message("invalid value for idBoard\n"), "invalid value for idBoard");
        assert_eq!(failure_message(""), "no response body");
    }

    #[test]
    fn test_failure_message_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let message = failure_message(&long);
        assert_eq!(message.len(), MAX_MESSAGE_LEN + 3);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn test_into_result_maps_failure_to_rejection() {
        let reply: RemoteReply<()> = RemoteReply::Failure {
            status: StatusCode::BAD_REQUEST,
            message: "invalid name".to_string(),
        };
        let err = reply
            .into_result(RemoteSystem::Board, "create board")
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::RemoteRejection { ref status, ref operation, .. }
                if status == "400" && operation == "create board"
        ));
    }
}
