//! Financial agent — the tool-orchestration core
//!
//! Advertises the tool schemas to the completion model, executes whichever
//! tools the model selects (validating names against the registry first),
//! feeds the structured results back, and returns the synthesized reply.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::completion::{
    CompletionModel, CompletionRequest, ToolResultMessage, Turn,
};
use crate::memory::{Message, MessageRole};
use crate::models::{AgentReply, AgentType, ToolInput};
use crate::tools::ToolRegistry;
use crate::Result;

/// Upper bound on tool-execution rounds per run
const MAX_TOOL_ROUNDS: usize = 4;

/// Only the most recent slice of history is replayed into the prompt
const MAX_HISTORY_MESSAGES: usize = 12;

const SYSTEM_PROMPT: &str = r#"You are a financial analysis expert with access to real-time data tools.

TOOLS AVAILABLE:
1. get_price_analysis(symbol, period) - price data, trends, technical indicators
2. get_news_sentiment(symbol) - market sentiment, news, fear/greed index
3. get_comprehensive_analysis(symbol, period) - complete analysis (recommended)

WORKFLOW:
1. Call a tool first to get real data; prefer get_comprehensive_analysis for most requests
2. Extract the symbol (AAPL, TSLA, BTC, ...) and period from the user message
3. Present the ACTUAL data from the tool responses

RULES:
- Never invent or estimate numbers; use only tool data
- If a tool reports degraded or missing data, say so instead of making up values
- Always name the symbol and period in your response

RESPONSE STRUCTURE:
1. State what you are analyzing (symbol + period)
2. Present the price data, then the sentiment data, from the tools
3. Close with insights grounded in the returned data, noting any data limitations"#;

pub struct FinancialAgent {
    completion: Arc<dyn CompletionModel>,
    registry: Arc<ToolRegistry>,
}

impl FinancialAgent {
    pub fn new(completion: Arc<dyn CompletionModel>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            completion,
            registry,
        }
    }

    pub fn agent_type(&self) -> AgentType {
        AgentType::FinancialManager
    }

    /// Run one exchange: the completion model decides which tools to call,
    /// tool results are fed back, and the final text is returned.
    ///
    /// Completion failures abort the run; tool failures degrade it.
    pub async fn run(
        &self,
        history: &[Message],
        user_message: &str,
        context: &Map<String, Value>,
    ) -> Result<AgentReply> {
        let started = Instant::now();

        let tools = self.registry.schemas().await;
        let mut turns = build_turns(history, user_message, context);
        let mut tools_invoked: Vec<String> = Vec::new();
        let mut rounds = 0;

        loop {
            let request = CompletionRequest {
                system_prompt: SYSTEM_PROMPT.to_string(),
                turns: turns.clone(),
                tools: tools.clone(),
            };

            let response = self.completion.complete(&request).await?;

            if response.tool_calls.is_empty() || rounds >= MAX_TOOL_ROUNDS {
                if !response.tool_calls.is_empty() {
                    warn!(
                        rounds = rounds,
                        "Tool round limit reached; returning current text"
                    );
                }

                let processing_time_ms = started.elapsed().as_millis() as u64;
                info!(
                    tools = tools_invoked.len(),
                    processing_time_ms, "Agent run complete"
                );

                return Ok(AgentReply {
                    text: response.text,
                    tools_invoked,
                    processing_time_ms,
                });
            }

            rounds += 1;
            debug!(
                round = rounds,
                requested = response.tool_calls.len(),
                "Executing tool calls"
            );

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                // fail closed: only names in the registered set are dispatched
                let tool = self.registry.get(&call.name).await?;

                let input = ToolInput {
                    tool_name: call.name.clone(),
                    parameters: call.arguments.clone(),
                };

                let payload = match tool.execute(&input).await {
                    Ok(output) => output.data,
                    Err(e) if e.is_recoverable() => {
                        warn!(tool = call.name.as_str(), error = %e, "Tool failed; reporting degraded data");
                        json!({ "degraded": true, "error": e.to_string() })
                    }
                    Err(e) => return Err(e),
                };

                if !tools_invoked.contains(&call.name) {
                    tools_invoked.push(call.name.clone());
                }

                results.push(ToolResultMessage {
                    tool_name: call.name.clone(),
                    payload,
                });
            }

            turns.push(Turn::ToolCalls(response.tool_calls));
            turns.push(Turn::ToolResults(results));
        }
    }
}

/// Compose the prompt turns: recent history, then the user message with any
/// caller-supplied context rendered as advisory hint lines.
fn build_turns(
    history: &[Message],
    user_message: &str,
    context: &Map<String, Value>,
) -> Vec<Turn> {
    let skip = history.len().saturating_sub(MAX_HISTORY_MESSAGES);

    let mut turns: Vec<Turn> = history[skip..]
        .iter()
        .map(|message| match message.role {
            MessageRole::User => Turn::User(message.content.clone()),
            MessageRole::Assistant => Turn::Assistant(message.content.clone()),
        })
        .collect();

    let mut current = String::new();
    if !context.is_empty() {
        current.push_str("User context (advisory):\n");
        for (key, value) in context {
            current.push_str(&format!("- {}: {}\n", key, value));
        }
        current.push('\n');
    }
    current.push_str(user_message);

    turns.push(Turn::User(current));
    turns
}
