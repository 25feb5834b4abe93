//! Completion capability — the language-model seam
//!
//! The completion model alone decides which tools to invoke for a message;
//! the orchestration core only advertises schemas and validates the names
//! it gets back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::models::{ToolCall, ToolSchema};
use crate::Result;

pub mod gemini;
pub use gemini::GeminiModel;

/// One turn of the prompt presented to the completion model
#[derive(Debug, Clone)]
pub enum Turn {
    User(String),
    Assistant(String),
    /// Tool invocations the model requested on a previous round
    ToolCalls(Vec<ToolCall>),
    /// Structured tool results fed back for synthesis
    ToolResults(Vec<ToolResultMessage>),
}

/// A tool's output (or normalized failure payload) addressed back to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub tool_name: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolSchema>,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl CompletionResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            text: String::new(),
            tool_calls: vec![ToolCall {
                name: name.into(),
                arguments,
            }],
        }
    }
}

/// Trait for completion providers (LLM controlled)
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    fn name(&self) -> &'static str;
}

/// Mock completion model for development & testing.
/// Plays back scripted responses in order, then falls back to a canned
/// text answer once the script is exhausted.
pub struct MockCompletionModel {
    scripted: Mutex<VecDeque<CompletionResponse>>,
}

impl MockCompletionModel {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            scripted: Mutex::new(responses.into()),
        }
    }

    /// A model that always answers with plain text and never calls tools
    pub fn unscripted() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl CompletionModel for MockCompletionModel {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        let next = self
            .scripted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        Ok(next.unwrap_or_else(|| {
            CompletionResponse::text_only("Here is a general market overview based on what I know.")
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_plays_back_script_then_falls_back() {
        let model = MockCompletionModel::new(vec![
            CompletionResponse::tool_call("get_price_analysis", json!({"symbol": "AAPL"})),
            CompletionResponse::text_only("done"),
        ]);

        let request = CompletionRequest {
            system_prompt: String::new(),
            turns: vec![Turn::User("hi".to_string())],
            tools: vec![],
        };

        let first = model.complete(&request).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        assert_eq!(first.tool_calls[0].name, "get_price_analysis");

        let second = model.complete(&request).await.unwrap();
        assert_eq!(second.text, "done");
        assert!(second.tool_calls.is_empty());

        let third = model.complete(&request).await.unwrap();
        assert!(third.tool_calls.is_empty());
        assert!(!third.text.is_empty());
    }
}
