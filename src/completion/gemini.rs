//! Gemini API client with function calling
//!
//! Maps the provider-neutral completion request onto the Gemini REST API:
//! tool schemas become function declarations, tool results become
//! functionResponse parts. Uses a long-lived reqwest::Client for
//! connection pooling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{error, info};

use crate::error::AgentError;
use crate::models::ToolCall;
use crate::Result;

use super::{CompletionModel, CompletionRequest, CompletionResponse, Turn};

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Reusable Gemini client (connection-pooled, bounded request timeout)
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: GEMINI_ENDPOINT.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(api_key: String, base_url: String) -> Self {
        let mut model = Self::new(api_key);
        model.base_url = base_url;
        model
    }

    fn build_request(request: &CompletionRequest) -> GeminiRequest {
        let contents = request.turns.iter().map(content_for_turn).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiToolSet {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|schema| FunctionDeclaration {
                        name: schema.name.clone(),
                        description: schema.description.clone(),
                        parameters: schema.parameters.clone(),
                    })
                    .collect(),
            }])
        };

        GeminiRequest {
            contents,
            tools,
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part::text(request.system_prompt.clone())],
            },
        }
    }
}

fn content_for_turn(turn: &Turn) -> Content {
    match turn {
        Turn::User(text) => Content {
            role: "user".to_string(),
            parts: vec![Part::text(text.clone())],
        },
        Turn::Assistant(text) => Content {
            role: "model".to_string(),
            parts: vec![Part::text(text.clone())],
        },
        Turn::ToolCalls(calls) => Content {
            role: "model".to_string(),
            parts: calls
                .iter()
                .map(|call| Part::function_call(call.name.clone(), call.arguments.clone()))
                .collect(),
        },
        Turn::ToolResults(results) => Content {
            role: "function".to_string(),
            parts: results
                .iter()
                .map(|result| {
                    // Gemini requires the response field to be an object
                    let response = if result.payload.is_object() {
                        result.payload.clone()
                    } else {
                        json!({ "result": result.payload })
                    };
                    Part::function_response(result.tool_name.clone(), response)
                })
                .collect(),
        },
    }
}

#[async_trait]
impl CompletionModel for GeminiModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        if self.api_key.is_empty() {
            return Err(AgentError::AgentUnavailable(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);
        let body = Self::build_request(request);

        info!(turns = request.turns.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AgentError::AgentUnavailable(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(AgentError::AgentUnavailable(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::AgentUnavailable(format!("Gemini parse error: {}", e))
        })?;

        let candidate = gemini_response.candidates.into_iter().next().ok_or_else(|| {
            AgentError::AgentUnavailable("No response from Gemini API".to_string())
        })?;

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.parts {
            if let Some(text) = part.text {
                text_parts.push(text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                    name: call.name,
                    arguments: call.args,
                });
            }
        }

        info!(
            tool_calls = tool_calls.len(),
            "Gemini response received"
        );

        Ok(CompletionResponse {
            text: text_parts.join("\n"),
            tool_calls,
        })
    }

    fn name(&self) -> &'static str {
        "gemini-2.0-flash"
    }
}

//
// ================= Wire Types =================
//

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiToolSet>>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize)]
struct GeminiToolSet {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            function_call: None,
            function_response: None,
        }
    }

    fn function_call(name: String, args: serde_json::Value) -> Self {
        Self {
            text: None,
            function_call: Some(FunctionCall { name, args }),
            function_response: None,
        }
    }

    fn function_response(name: String, response: serde_json::Value) -> Self {
        Self {
            text: None,
            function_call: None,
            function_response: Some(FunctionResponse { name, response }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolSchema;

    fn sample_request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are a financial analyst.".to_string(),
            turns: vec![Turn::User("Analyze AAPL".to_string())],
            tools: vec![ToolSchema {
                name: "get_price_analysis".to_string(),
                description: "Price data and technical indicators".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "symbol": { "type": "string" }
                    },
                    "required": ["symbol"]
                }),
            }],
        }
    }

    #[test]
    fn test_request_serialization_includes_function_declarations() {
        let body = GeminiModel::build_request(&sample_request());
        let serialized = serde_json::to_string(&body).unwrap();

        assert!(serialized.contains("function_declarations"));
        assert!(serialized.contains("get_price_analysis"));
        assert!(serialized.contains("Analyze AAPL"));
    }

    #[test]
    fn test_tool_result_turn_maps_to_function_response() {
        let turn = Turn::ToolResults(vec![super::super::ToolResultMessage {
            tool_name: "get_price_analysis".to_string(),
            payload: json!({"current_price": 195.5}),
        }]);

        let content = content_for_turn(&turn);
        assert_eq!(content.role, "function");
        let response = content.parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "get_price_analysis");
        assert_eq!(response.response["current_price"], json!(195.5));
    }

    #[test]
    fn test_response_parsing_extracts_function_call() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {
                            "name": "get_news_sentiment",
                            "args": { "symbol": "TSLA" }
                        }
                    }]
                }
            }]
        });

        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        let part = &parsed.candidates[0].content.parts[0];
        let call = part.function_call.as_ref().unwrap();
        assert_eq!(call.name, "get_news_sentiment");
        assert_eq!(call.args["symbol"], json!("TSLA"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_agent_unavailable() {
        let model = GeminiModel::with_base_url(String::new(), "http://127.0.0.1:9".to_string());
        let err = model.complete(&sample_request()).await.unwrap_err();
        assert!(matches!(err, AgentError::AgentUnavailable(_)));
    }
}
