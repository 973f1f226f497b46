//! MCP server exposing a single `notify` tool to agent runtimes.
//!
//! Runs over stdio; each call is forwarded to the notification daemon.

use std::future::Future;

use rmcp::handler::server::tool::{Parameters, ToolRouter};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::{ClientError, NotifyClient};

/// Types advertised to the agent. `review` has no sound on the daemon side
/// and is rejected there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, rmcp::schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Question,
    Permission,
    Done,
    Error,
    Status,
    Waiting,
    Review,
}

impl NotifyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Permission => "permission",
            Self::Done => "done",
            Self::Error => "error",
            Self::Status => "status",
            Self::Waiting => "waiting",
            Self::Review => "review",
        }
    }
}

// --- Tool parameter structs ---

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct NotifyRequest {
    #[serde(rename = "type")]
    #[schemars(description = "Notification type")]
    pub kind: NotifyKind,
    #[schemars(description = "Message to vocalize")]
    pub message: String,
}

/// Shape the tool result for one notify call.
pub fn notify_result(kind: NotifyKind, message: &str, sent: Result<String, ClientError>) -> CallToolResult {
    match sent {
        Ok(_) => CallToolResult::success(vec![Content::text(format!(
            "{}: \"{message}\"",
            kind.as_str().to_uppercase()
        ))]),
        Err(ClientError::Rejected { error, .. }) => {
            warn!("Notification rejected: {error}");
            CallToolResult::error(vec![Content::text(format!(
                "Notification rejected: {error}"
            ))])
        }
        Err(e) => {
            warn!("Error sending notification: {e}");
            CallToolResult::error(vec![Content::text(format!(
                "Error sending notification: {e}"
            ))])
        }
    }
}

// --- MCP Server handler ---

#[derive(Clone)]
pub struct AgentNotifyMcp {
    client: NotifyClient,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl AgentNotifyMcp {
    pub fn new(client: NotifyClient) -> Self {
        info!("Forwarding notifications to {}", client.base_url());
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Send an audio notification with text-to-speech to alert the user")]
    async fn notify(
        &self,
        Parameters(req): Parameters<NotifyRequest>,
    ) -> Result<CallToolResult, McpError> {
        let sent = self.client.notify(req.kind.as_str(), &req.message).await;
        Ok(notify_result(req.kind, &req.message, sent))
    }
}

#[tool_handler]
impl ServerHandler for AgentNotifyMcp {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo {
            instructions: Some("Audio notifications for the user. Call notify with a type and a short message to speak.".into()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        };
        info.server_info.name = "agent-notify".into();
        info.server_info.version = env!("CARGO_PKG_VERSION").into();
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn text_of(result: &CallToolResult) -> String {
        let value = serde_json::to_value(result).unwrap();
        value["content"][0]["text"].as_str().unwrap_or_default().to_string()
    }

    #[test]
    fn success_echoes_type_and_message() {
        let result = notify_result(NotifyKind::Done, "Build finished", Ok("ok".into()));
        assert_ne!(result.is_error, Some(true));
        assert_eq!(text_of(&result), "DONE: \"Build finished\"");
    }

    #[test]
    fn rejection_is_error_flagged() {
        let rejected = Err(ClientError::Rejected {
            status: reqwest::StatusCode::BAD_REQUEST,
            error: "Unknown notification type: review. Valid types: question, permission, done, error, status, waiting".into(),
        });
        let result = notify_result(NotifyKind::Review, "look", rejected);
        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).contains("Unknown notification type: review"));
    }

    #[test]
    fn schema_advertises_seven_types() {
        let schema = serde_json::to_value(schemars::schema_for!(NotifyKind)).unwrap();
        let variants: Vec<&str> = schema["enum"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(
            variants,
            ["question", "permission", "done", "error", "status", "waiting", "review"]
        );
    }

    #[test]
    fn schema_requires_type_and_message() {
        let schema = serde_json::to_value(schemars::schema_for!(NotifyRequest)).unwrap();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(required.contains(&"type"));
        assert!(required.contains(&"message"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_call_reaches_daemon() {
        let (base, _playback) = crate::server::tests::spawn_daemon("true").await;
        let mcp = AgentNotifyMcp::new(NotifyClient::new(base));

        let ok = mcp
            .notify(Parameters(NotifyRequest {
                kind: NotifyKind::Question,
                message: "Which branch?".into(),
            }))
            .await
            .unwrap();
        assert_ne!(ok.is_error, Some(true));

        let review = mcp
            .notify(Parameters(NotifyRequest {
                kind: NotifyKind::Review,
                message: "Please review".into(),
            }))
            .await
            .unwrap();
        assert_eq!(review.is_error, Some(true));
    }
}
