//! Tool trait and registry
//!
//! Tools wrap the external market-data capabilities and normalize their
//! results or failures into structured payloads for the completion model.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::AgentError;
use crate::models::{ToolInput, ToolOutput, ToolSchema};
use crate::Result;

pub mod combined;
pub mod news;
pub mod price;

pub use combined::CombinedAnalysisTool;
pub use news::{NewsApiFeed, NewsFeed, NewsSentimentTool};
pub use price::{PriceAnalysisTool, PriceFeed, YahooFinanceFeed};

pub const PRICE_ANALYSIS: &str = "get_price_analysis";
pub const NEWS_SENTIMENT: &str = "get_news_sentiment";
pub const COMPREHENSIVE_ANALYSIS: &str = "get_comprehensive_analysis";

const REGISTERED_TOOLS: &[&str] = &[PRICE_ANALYSIS, NEWS_SENTIMENT, COMPREHENSIVE_ANALYSIS];

/// Trait for a single tool invocable by the agent
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema for the tool's parameters, advertised to the completion model
    fn parameters(&self) -> serde_json::Value;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Tool registry with lazy, one-time construction per tool name.
///
/// The instance map's lock is held across construction, so concurrent
/// first-use requests for one name cannot build two instances.
pub struct ToolRegistry {
    price_feed: Arc<dyn PriceFeed>,
    news_feed: Arc<dyn NewsFeed>,
    tools: Mutex<HashMap<&'static str, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new(price_feed: Arc<dyn PriceFeed>, news_feed: Arc<dyn NewsFeed>) -> Self {
        Self {
            price_feed,
            news_feed,
            tools: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the singleton instance for a tool name, constructing it on
    /// first request. Unknown names fail closed.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        let key = REGISTERED_TOOLS
            .iter()
            .find(|registered| **registered == name)
            .copied()
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;

        let mut tools = self.tools.lock().await;
        Ok(self.get_or_build(&mut tools, key))
    }

    fn get_or_build(
        &self,
        tools: &mut HashMap<&'static str, Arc<dyn Tool>>,
        name: &'static str,
    ) -> Arc<dyn Tool> {
        if let Some(tool) = tools.get(name) {
            return tool.clone();
        }

        let tool: Arc<dyn Tool> = match name {
            PRICE_ANALYSIS => Arc::new(PriceAnalysisTool::new(self.price_feed.clone())),
            NEWS_SENTIMENT => Arc::new(NewsSentimentTool::new(self.news_feed.clone())),
            _ => {
                // combined analysis reuses the two singleton sub-tools
                let price = self.get_or_build(tools, PRICE_ANALYSIS);
                let news = self.get_or_build(tools, NEWS_SENTIMENT);
                Arc::new(CombinedAnalysisTool::new(price, news))
            }
        };

        tools.insert(name, tool.clone());
        tool
    }

    pub fn known_tools(&self) -> &'static [&'static str] {
        REGISTERED_TOOLS
    }

    /// Schemas for every registered tool, in registration order
    pub async fn schemas(&self) -> Vec<ToolSchema> {
        let mut tools = self.tools.lock().await;
        REGISTERED_TOOLS
            .iter()
            .map(|name| self.get_or_build(&mut tools, name).schema())
            .collect()
    }
}
