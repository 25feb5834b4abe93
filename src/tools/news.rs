//! News sentiment tool
//!
//! Wraps the news feed and scores market sentiment from recent headlines.
//! Degraded mode is first class: a missing credential or feed outage
//! produces an explicit "sentiment unavailable" payload so the agent can
//! still answer from price data alone.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;

use super::{Tool, NEWS_SENTIMENT};

/// Upper bound on headlines returned to the agent
const MAX_HEADLINES: usize = 5;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "positive", "strong", "record", "beat", "growth", "profit", "gain", "rise", "up",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "negative", "weak", "loss", "fall", "drop", "decline", "risk", "concern", "down",
];

/// A single news item from the feed, most recent first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub source: String,
    pub published_at: String,
    pub description: Option<String>,
}

/// Capability interface for fetching recent financial headlines
#[async_trait]
pub trait NewsFeed: Send + Sync {
    async fn fetch(&self, symbol: &str, max_results: usize) -> Result<Vec<Headline>>;
}

/// NewsAPI backed feed; a missing credential surfaces as a recoverable
/// unavailability, not a constructor failure
pub struct NewsApiFeed {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl NewsApiFeed {
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: "https://newsapi.org/v2/everything".to_string(),
        }
    }
}

#[async_trait]
impl NewsFeed for NewsApiFeed {
    async fn fetch(&self, symbol: &str, max_results: usize) -> Result<Vec<Headline>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AgentError::DataUnavailable("NEWS_API_KEY not configured".to_string())
        })?;

        let search_query = format!("{symbol} stock OR {symbol} shares OR {symbol} earnings");
        let page_size = max_results.to_string();
        let from_date = (Utc::now() - ChronoDuration::days(7))
            .format("%Y-%m-%d")
            .to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", search_query.as_str()),
                ("apiKey", api_key),
                ("pageSize", page_size.as_str()),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("from", from_date.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::UpstreamTimeout(format!("News feed timed out for {}", symbol))
                } else {
                    AgentError::DataUnavailable(format!("News feed request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(AgentError::DataUnavailable(format!(
                "News feed returned {} for {}",
                response.status(),
                symbol
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            AgentError::DataUnavailable(format!("Invalid news feed response: {}", e))
        })?;

        let articles = data
            .get("articles")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(articles
            .iter()
            .take(max_results)
            .map(|article| Headline {
                title: article
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                source: article
                    .pointer("/source/name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                published_at: article
                    .get("publishedAt")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                description: article
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .collect())
    }
}

//
// ================= Report =================
//

/// Structured sentiment report produced by the news tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSentimentReport {
    pub symbol: String,
    /// positive / negative / neutral, or "unavailable" in degraded mode
    pub overall_sentiment: String,
    pub fear_greed_index: Option<u8>,
    pub key_themes: Vec<String>,
    pub top_headlines: Vec<String>,
    pub risk_factors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct NewsSentimentTool {
    feed: Arc<dyn NewsFeed>,
}

impl NewsSentimentTool {
    pub fn new(feed: Arc<dyn NewsFeed>) -> Self {
        Self { feed }
    }

    /// Never fails on feed problems: a dead news source degrades the
    /// report instead of aborting the request.
    pub async fn analyze(&self, symbol: &str) -> NewsSentimentReport {
        match self.feed.fetch(symbol, MAX_HEADLINES).await {
            Ok(headlines) => {
                info!(
                    symbol = symbol,
                    headlines = headlines.len(),
                    "News headlines fetched"
                );
                build_report(symbol, &headlines)
            }
            Err(e) => {
                warn!(symbol = symbol, error = %e, "News feed unavailable; degrading");
                degraded_report(symbol, &e.to_string())
            }
        }
    }
}

#[async_trait]
impl Tool for NewsSentimentTool {
    fn name(&self) -> &'static str {
        NEWS_SENTIMENT
    }

    fn description(&self) -> &'static str {
        "Get recent headlines, market sentiment, fear/greed index and risk factors for a symbol"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Stock or cryptocurrency symbol to search news for"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        if !input.parameters.is_object() {
            return Err(AgentError::InvalidToolInput(
                "tool parameters must be a JSON object".to_string(),
            ));
        }

        let symbol = input
            .parameters
            .get("symbol")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        if symbol.is_empty() {
            return Err(AgentError::InvalidToolInput(
                "'symbol' must be a non-empty ticker".to_string(),
            ));
        }

        let report = self.analyze(symbol).await;

        Ok(ToolOutput {
            success: true,
            data: serde_json::to_value(report)?,
            error: None,
        })
    }
}

/// Marker value for the degraded-mode sentiment field
pub const SENTIMENT_UNAVAILABLE: &str = "unavailable";

fn degraded_report(symbol: &str, reason: &str) -> NewsSentimentReport {
    NewsSentimentReport {
        symbol: symbol.to_string(),
        overall_sentiment: SENTIMENT_UNAVAILABLE.to_string(),
        fear_greed_index: None,
        key_themes: Vec::new(),
        top_headlines: Vec::new(),
        risk_factors: vec![format!("News data unavailable: {}", reason)],
        timestamp: Utc::now(),
    }
}

fn build_report(symbol: &str, headlines: &[Headline]) -> NewsSentimentReport {
    let sentiments: Vec<&'static str> = headlines
        .iter()
        .map(|headline| {
            let text = match &headline.description {
                Some(description) => format!("{} {}", headline.title, description),
                None => headline.title.clone(),
            };
            analyze_sentiment(&text)
        })
        .collect();

    let overall = overall_sentiment(&sentiments);

    let risk_factors = headlines
        .iter()
        .zip(&sentiments)
        .filter(|(_, sentiment)| **sentiment == "negative")
        .map(|(headline, _)| format!("Negative news: {}", headline.title))
        .collect();

    NewsSentimentReport {
        symbol: symbol.to_string(),
        overall_sentiment: overall.to_string(),
        fear_greed_index: Some(fear_greed_index(&sentiments, overall)),
        key_themes: extract_key_themes(headlines),
        top_headlines: headlines
            .iter()
            .take(MAX_HEADLINES)
            .map(|headline| headline.title.clone())
            .collect(),
        risk_factors,
        timestamp: Utc::now(),
    }
}

/// Keyword-count sentiment label for one article
fn analyze_sentiment(text: &str) -> &'static str {
    let lowered = text.to_lowercase();

    let positive = POSITIVE_WORDS
        .iter()
        .filter(|word| lowered.contains(**word))
        .count();
    let negative = NEGATIVE_WORDS
        .iter()
        .filter(|word| lowered.contains(**word))
        .count();

    if positive > negative {
        "positive"
    } else if negative > positive {
        "negative"
    } else {
        "neutral"
    }
}

fn overall_sentiment(sentiments: &[&'static str]) -> &'static str {
    let positive = sentiments.iter().filter(|s| **s == "positive").count();
    let negative = sentiments.iter().filter(|s| **s == "negative").count();

    if positive > negative {
        "positive"
    } else if negative > positive {
        "negative"
    } else {
        "neutral"
    }
}

/// 0-100 scale: positive headline ratio, nudged by the overall label
fn fear_greed_index(sentiments: &[&'static str], overall: &str) -> u8 {
    if sentiments.is_empty() {
        return 50;
    }

    let positive = sentiments.iter().filter(|s| **s == "positive").count();
    let base_score = positive as f64 / sentiments.len() as f64 * 100.0;

    let adjustment = match overall {
        "positive" => 10.0,
        "negative" => -10.0,
        _ => 0.0,
    };

    (base_score + adjustment).clamp(0.0, 100.0) as u8
}

fn extract_key_themes(headlines: &[Headline]) -> Vec<String> {
    const THEME_KEYWORDS: &[(&str, &[&str])] = &[
        ("Financial Performance", &["earnings", "profit", "revenue"]),
        ("Product Development", &["product", "launch", "release"]),
        ("Regulatory Environment", &["regulation", "legal", "law"]),
        ("Business Partnerships", &["partnership", "deal", "acquisition"]),
        ("Market Activity", &["market", "trading", "volume"]),
    ];

    let mut themes: Vec<String> = Vec::new();
    for headline in headlines {
        let lowered = headline.title.to_lowercase();
        for (theme, keywords) in THEME_KEYWORDS {
            if keywords.iter().any(|keyword| lowered.contains(keyword)) {
                let theme = theme.to_string();
                if !themes.contains(&theme) {
                    themes.push(theme);
                }
            }
        }
    }

    themes.truncate(5);
    themes
}


#[cfg(test)]
mod tests {
    use super::testing::{StaticNewsFeed, UnavailableNewsFeed};
    use super::*;

    fn input(parameters: Value) -> ToolInput {
        ToolInput {
            tool_name: NEWS_SENTIMENT.to_string(),
            parameters,
        }
    }

    #[tokio::test]
    async fn test_sentiment_report_from_headlines() {
        let tool = NewsSentimentTool::new(Arc::new(StaticNewsFeed::positive()));
        let output = tool.execute(&input(json!({"symbol": "AAPL"}))).await.unwrap();

        assert!(output.success);
        let report: NewsSentimentReport = serde_json::from_value(output.data).unwrap();
        assert_eq!(report.overall_sentiment, "positive");
        assert_eq!(report.top_headlines.len(), 3);
        assert!(report.fear_greed_index.unwrap() > 50);
        assert_eq!(report.risk_factors.len(), 1);
        assert!(report.risk_factors[0].contains("Regulatory concern"));
    }

    #[tokio::test]
    async fn test_degraded_mode_never_fails_the_request() {
        let tool = NewsSentimentTool::new(Arc::new(UnavailableNewsFeed));
        let output = tool.execute(&input(json!({"symbol": "TSLA"}))).await.unwrap();

        assert!(output.success);
        let report: NewsSentimentReport = serde_json::from_value(output.data).unwrap();
        assert_eq!(report.overall_sentiment, SENTIMENT_UNAVAILABLE);
        assert!(report.top_headlines.is_empty());
        assert!(report.key_themes.is_empty());
        assert_eq!(report.fear_greed_index, None);
        assert!(report.risk_factors[0].contains("News data unavailable"));
    }

    #[tokio::test]
    async fn test_empty_symbol_is_a_contract_error() {
        let tool = NewsSentimentTool::new(Arc::new(StaticNewsFeed::positive()));
        let err = tool.execute(&input(json!({}))).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolInput(_)));
    }

    #[test]
    fn test_analyze_sentiment_keywords() {
        assert_eq!(analyze_sentiment("Record profit growth"), "positive");
        assert_eq!(analyze_sentiment("Shares fall on weak outlook"), "negative");
        assert_eq!(analyze_sentiment("Company holds annual meeting"), "neutral");
    }

    #[test]
    fn test_fear_greed_scale() {
        assert_eq!(fear_greed_index(&[], "neutral"), 50);
        // 2 of 3 positive => 66 + 10
        assert_eq!(
            fear_greed_index(&["positive", "positive", "negative"], "positive"),
            76
        );
        assert_eq!(
            fear_greed_index(&["negative", "negative", "negative"], "negative"),
            0
        );
    }

    #[test]
    fn test_key_themes_are_deduplicated() {
        let headlines = vec![
            Headline {
                title: "Earnings beat, revenue up".to_string(),
                source: "FT".to_string(),
                published_at: String::new(),
                description: None,
            },
            Headline {
                title: "Quarterly earnings preview".to_string(),
                source: "FT".to_string(),
                published_at: String::new(),
                description: None,
            },
        ];

        let themes = extract_key_themes(&headlines);
        assert_eq!(themes, vec!["Financial Performance".to_string()]);
    }
}
