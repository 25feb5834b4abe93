//! Agent orchestration service — the session + dispatch façade
//!
//! Resolves or creates the conversation session, runs the agent with the
//! session's prior history, and persists the exchange. The user message is
//! appended before the agent runs so a failed agent call still leaves the
//! turn recorded.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::FinancialAgent;
use crate::error::AgentError;
use crate::health::HealthRegistry;
use crate::memory::{ConversationSession, ConversationStore, Message};
use crate::models::{AgentHealthStatus, AgentType, ChatOutcome};
use crate::Result;

/// Longest accepted user message, matching the public request contract
pub const MAX_MESSAGE_LENGTH: usize = 4000;

pub struct AgentService {
    agent: Arc<FinancialAgent>,
    store: ConversationStore,
    health: HealthRegistry,
}

impl AgentService {
    pub fn new(agent: Arc<FinancialAgent>, health: HealthRegistry) -> Self {
        Self {
            agent,
            store: ConversationStore::new(),
            health,
        }
    }

    pub async fn create_conversation(&self) -> Uuid {
        let id = self.store.create(None).await;
        info!(conversation_id = %id, "Conversation created");
        id
    }

    pub async fn get_conversation(&self, id: Uuid) -> Result<ConversationSession> {
        self.store.snapshot(id).await
    }

    /// Process one chat message. A missing conversation id creates a new
    /// session implicitly; an unknown id is request-fatal.
    pub async fn send_message(
        &self,
        conversation_id: Option<Uuid>,
        message: &str,
        context: Option<Value>,
    ) -> Result<ChatOutcome> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AgentError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }
        if message.len() > MAX_MESSAGE_LENGTH {
            return Err(AgentError::InvalidRequest(format!(
                "message exceeds {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let context = parse_context(context)?;

        let conversation_id = match conversation_id {
            Some(id) => id,
            None => self.store.create(None).await,
        };
        let handle = self.store.handle(conversation_id).await?;

        // Per-session lock held across the agent call: appends for one
        // conversation always land as clean (user, assistant) pairs.
        let mut session = handle.lock().await;

        let history = session.messages.clone();
        // recorded before the agent runs; survives an agent failure
        session.append(Message::user(message));

        let reply = match self.agent.run(&history, message, &context).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(conversation_id = %conversation_id, error = %e, "Agent run failed");
                return Err(e);
            }
        };

        session.append(Message::assistant(reply.text.clone()));

        info!(
            conversation_id = %conversation_id,
            tool_used = !reply.tools_invoked.is_empty(),
            processing_time_ms = reply.processing_time_ms,
            "Message processed"
        );

        Ok(ChatOutcome {
            response: reply.text,
            conversation_id,
            agent_type: self.agent.agent_type(),
            timestamp: Utc::now(),
            processing_time_ms: reply.processing_time_ms,
            tool_used: !reply.tools_invoked.is_empty(),
            tools_invoked: reply.tools_invoked,
        })
    }

    pub async fn agent_statuses(&self) -> Vec<AgentHealthStatus> {
        self.health.statuses().await
    }

    pub async fn probe_health(&self, agent_type: AgentType) -> AgentHealthStatus {
        self.health.probe(agent_type).await
    }

    pub async fn conversation_count(&self) -> usize {
        self.store.session_count().await
    }
}

fn parse_context(context: Option<Value>) -> Result<Map<String, Value>> {
    match context {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(AgentError::InvalidRequest(
            "context must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{
        CompletionModel, CompletionRequest, CompletionResponse, MockCompletionModel,
    };
    use crate::memory::MessageRole;
    use crate::tools::news::testing::{StaticNewsFeed, UnavailableNewsFeed};
    use crate::tools::price::testing::{FailingPriceFeed, StaticPriceFeed};
    use crate::tools::{
        NewsFeed, PriceFeed, ToolRegistry, COMPREHENSIVE_ANALYSIS, PRICE_ANALYSIS,
    };
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingCompletionModel;

    #[async_trait]
    impl CompletionModel for FailingCompletionModel {
        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
            Err(AgentError::AgentUnavailable(
                "completion provider unreachable".to_string(),
            ))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn service_with(
        completion: Arc<dyn CompletionModel>,
        price_feed: Arc<dyn PriceFeed>,
        news_feed: Arc<dyn NewsFeed>,
    ) -> Arc<AgentService> {
        let registry = Arc::new(ToolRegistry::new(price_feed, news_feed));
        let agent = Arc::new(FinancialAgent::new(completion.clone(), registry.clone()));
        let health = HealthRegistry::new(completion, registry);
        Arc::new(AgentService::new(agent, health))
    }

    fn scripted_service(responses: Vec<CompletionResponse>) -> Arc<AgentService> {
        service_with(
            Arc::new(MockCompletionModel::new(responses)),
            Arc::new(StaticPriceFeed::uptrend(30)),
            Arc::new(StaticNewsFeed::positive()),
        )
    }

    #[tokio::test]
    async fn test_create_and_get_conversation() {
        let service = scripted_service(vec![]);
        let id = service.create_conversation().await;

        let session = service.get_conversation(id).await.unwrap();
        assert_eq!(session.id, id);
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_conversation_has_no_side_effect() {
        let service = scripted_service(vec![]);
        service.create_conversation().await;

        let err = service.get_conversation(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AgentError::ConversationNotFound(_)));
        assert_eq!(service.conversation_count().await, 1);
    }

    #[tokio::test]
    async fn test_send_to_unknown_conversation_is_fatal() {
        let service = scripted_service(vec![]);
        let err = service
            .send_message(Some(Uuid::new_v4()), "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn test_aapl_trend_end_to_end() {
        let service = scripted_service(vec![
            CompletionResponse::tool_call(
                PRICE_ANALYSIS,
                json!({"symbol": "AAPL", "period": "1month"}),
            ),
            CompletionResponse::text_only("AAPL shows an upward trend over the last month."),
        ]);

        let id = service.create_conversation().await;
        let outcome = service
            .send_message(Some(id), "What is AAPL's current trend?", Some(json!({})))
            .await
            .unwrap();

        assert!(outcome.response.contains("upward trend"));
        assert!(outcome.tool_used);
        assert!(outcome.tools_invoked.contains(&PRICE_ANALYSIS.to_string()));
        assert_eq!(outcome.conversation_id, id);

        let session = service.get_conversation(id).await.unwrap();
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.messages[0].role, MessageRole::User);
        assert_eq!(session.messages[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_tsla_with_news_down_still_succeeds() {
        let service = service_with(
            Arc::new(MockCompletionModel::new(vec![
                CompletionResponse::tool_call(
                    COMPREHENSIVE_ANALYSIS,
                    json!({"symbol": "TSLA", "period": "1month"}),
                ),
                CompletionResponse::text_only(
                    "TSLA gained over the month. Sentiment data is currently unavailable.",
                ),
            ])),
            Arc::new(StaticPriceFeed::uptrend(30)),
            Arc::new(UnavailableNewsFeed),
        );

        let outcome = service
            .send_message(None, "Analyze TSLA", None)
            .await
            .unwrap();

        assert!(outcome.tool_used);
        assert!(!outcome.tools_invoked.is_empty());
        // implicit session was created and holds the exchange
        let session = service.get_conversation(outcome.conversation_id).await.unwrap();
        assert_eq!(session.message_count(), 2);
    }

    #[tokio::test]
    async fn test_both_feeds_down_still_replies() {
        let service = service_with(
            Arc::new(MockCompletionModel::new(vec![
                CompletionResponse::tool_call(
                    COMPREHENSIVE_ANALYSIS,
                    json!({"symbol": "ZZZZ", "period": "1month"}),
                ),
                CompletionResponse::text_only(
                    "There is insufficient data to analyze ZZZZ right now.",
                ),
            ])),
            Arc::new(FailingPriceFeed { timeout: false }),
            Arc::new(UnavailableNewsFeed),
        );

        let outcome = service.send_message(None, "Analyze ZZZZ", None).await.unwrap();
        assert!(outcome.response.contains("insufficient data"));
        assert!(outcome.tool_used);
    }

    #[tokio::test]
    async fn test_agent_failure_keeps_user_message() {
        let service = service_with(
            Arc::new(FailingCompletionModel),
            Arc::new(StaticPriceFeed::uptrend(30)),
            Arc::new(StaticNewsFeed::positive()),
        );

        let id = service.create_conversation().await;
        let err = service
            .send_message(Some(id), "Analyze AAPL", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::AgentUnavailable(_)));

        let session = service.get_conversation(id).await.unwrap();
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.messages[0].role, MessageRole::User);
        assert_eq!(session.messages[0].content, "Analyze AAPL");
    }

    #[tokio::test]
    async fn test_request_contract_checks() {
        let service = scripted_service(vec![]);

        let err = service.send_message(None, "   ", None).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));

        let err = service
            .send_message(None, "hello", Some(json!(["not", "an", "object"])))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));

        let long_message = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        let err = service.send_message(None, &long_message, None).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));

        // contract failures created no sessions
        assert_eq!(service.conversation_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_sends_keep_pairs_intact() {
        // unscripted mock: every call answers with plain text
        let service = service_with(
            Arc::new(MockCompletionModel::unscripted()),
            Arc::new(StaticPriceFeed::uptrend(30)),
            Arc::new(StaticNewsFeed::positive()),
        );

        let id = service.create_conversation().await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .send_message(Some(id), &format!("question {i}"), None)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let session = service.get_conversation(id).await.unwrap();
        assert_eq!(session.message_count(), 16);
        for pair in session.messages.chunks(2) {
            assert_eq!(pair[0].role, MessageRole::User);
            assert_eq!(pair[1].role, MessageRole::Assistant);
        }
    }

    #[tokio::test]
    async fn test_health_probe_and_status() {
        let service = scripted_service(vec![]);
        assert!(service.agent_statuses().await.is_empty());

        let status = service.probe_health(AgentType::FinancialManager).await;
        assert!(status.is_available);
        assert_eq!(service.agent_statuses().await.len(), 1);
    }
}
