//! Combined analysis tool
//!
//! Fuses the price snapshot and the news sentiment report into one payload.
//! Either sub-tool may fail independently and the fusion still produces a
//! best-effort narrative; only both failing downgrades the result to an
//! explicit insufficient-data payload. Numbers are never fabricated.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::models::{ToolInput, ToolOutput};
use crate::Result;

use super::news::SENTIMENT_UNAVAILABLE;
use super::price::parse_symbol_and_period;
use super::{Tool, COMPREHENSIVE_ANALYSIS};

pub struct CombinedAnalysisTool {
    price: Arc<dyn Tool>,
    news: Arc<dyn Tool>,
}

impl CombinedAnalysisTool {
    pub fn new(price: Arc<dyn Tool>, news: Arc<dyn Tool>) -> Self {
        Self { price, news }
    }
}

#[async_trait]
impl Tool for CombinedAnalysisTool {
    fn name(&self) -> &'static str {
        COMPREHENSIVE_ANALYSIS
    }

    fn description(&self) -> &'static str {
        "Get a complete analysis combining price data and market sentiment (recommended for most requests)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Stock or cryptocurrency symbol (e.g. AAPL, BTC)"
                },
                "period": {
                    "type": "string",
                    "enum": ["1week", "2weeks", "1month", "3months", "6months", "1year"],
                    "description": "Analysis period (defaults to 1month)"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        // contract checks up front, before either sub-tool makes a call
        let (symbol, period) = parse_symbol_and_period(input)?;

        let price_input = ToolInput {
            tool_name: self.price.name().to_string(),
            parameters: json!({ "symbol": symbol, "period": period.as_str() }),
        };
        let news_input = ToolInput {
            tool_name: self.news.name().to_string(),
            parameters: json!({ "symbol": symbol }),
        };

        let (price_result, news_result) =
            tokio::join!(self.price.execute(&price_input), self.news.execute(&news_input));

        let price_data = match price_result {
            Ok(output) => Some(output.data),
            Err(e) if e.is_recoverable() => {
                warn!(symbol = symbol.as_str(), error = %e, "Price leg failed; continuing with sentiment only");
                None
            }
            Err(e) => return Err(e),
        };

        // the news tool degrades internally and only errors on contract violations
        let news_data = news_result?.data;
        let news_usable = news_data
            .get("overall_sentiment")
            .and_then(Value::as_str)
            .map(|sentiment| sentiment != SENTIMENT_UNAVAILABLE)
            .unwrap_or(false);

        if price_data.is_none() && !news_usable {
            return Ok(ToolOutput {
                success: true,
                data: json!({
                    "symbol": symbol,
                    "analysis_period": period.as_str(),
                    "insufficient_data": true,
                    "summary": format!(
                        "Insufficient data: neither price nor news sources are currently available for {}. No figures can be reported.",
                        symbol
                    ),
                    "key_insights": [],
                }),
                error: None,
            });
        }

        let insights = combined_insights(price_data.as_ref(), &news_data, news_usable);

        Ok(ToolOutput {
            success: true,
            data: json!({
                "symbol": symbol,
                "analysis_period": period.as_str(),
                "price_analysis": price_data,
                "sentiment_analysis": news_data,
                "key_insights": insights,
                "summary": format!("Comprehensive analysis of {} over {}", symbol, period.as_str()),
            }),
            error: None,
        })
    }
}

/// Cross-source insights; only states what the available data supports
fn combined_insights(price: Option<&Value>, news: &Value, news_usable: bool) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(price) = price {
        let change_pct = price
            .get("price_change_percentage")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        match price.get("trend_direction").and_then(Value::as_str) {
            Some("bullish") => insights.push(format!(
                "Strong upward momentum with {:.2}% gain over the period",
                change_pct
            )),
            Some("bearish") => insights.push(format!(
                "Facing downward pressure with {:.2}% change over the period",
                change_pct
            )),
            _ => {}
        }

        if price.get("volume_trend").and_then(Value::as_str) == Some("increasing") {
            insights.push("Increasing trading volume supports the price trend".to_string());
        }
    } else {
        insights.push("Price data is currently unavailable; insights reflect sentiment only".to_string());
    }

    if news_usable {
        match news.get("overall_sentiment").and_then(Value::as_str) {
            Some("positive") => {
                insights.push("Positive market sentiment aligns with recent news flow".to_string())
            }
            Some("negative") => insights.push(
                "Market sentiment shows concerns that may impact performance".to_string(),
            ),
            _ => {}
        }

        if let Some(fear_greed) = news.get("fear_greed_index").and_then(Value::as_u64) {
            if fear_greed > 70 {
                insights.push("High greed index suggests optimistic market sentiment".to_string());
            } else if fear_greed < 30 {
                insights.push("Low fear index may indicate potential buying opportunity".to_string());
            }
        }

        let headline_count = news
            .get("top_headlines")
            .and_then(Value::as_array)
            .map(|headlines| headlines.len())
            .unwrap_or(0);
        if headline_count > 0 {
            insights.push(format!(
                "Recent news includes {} key developments",
                headline_count
            ));
        }
    } else {
        insights.push("News sentiment is currently unavailable; insights reflect price data only".to_string());
    }

    insights.truncate(5);
    if insights.is_empty() {
        insights.push("Analysis completed with available market data".to_string());
    }
    insights
}

#[cfg(test)]
mod tests {
    use super::super::news::testing::{StaticNewsFeed, UnavailableNewsFeed};
    use super::super::news::NewsSentimentTool;
    use super::super::price::testing::{FailingPriceFeed, StaticPriceFeed};
    use super::super::price::PriceAnalysisTool;
    use super::*;
    use crate::error::AgentError;

    fn combined(price_feed_up: bool, news_up: bool) -> CombinedAnalysisTool {
        let price: Arc<dyn Tool> = if price_feed_up {
            Arc::new(PriceAnalysisTool::new(Arc::new(StaticPriceFeed::uptrend(30))))
        } else {
            Arc::new(PriceAnalysisTool::new(Arc::new(FailingPriceFeed {
                timeout: false,
            })))
        };

        let news: Arc<dyn Tool> = if news_up {
            Arc::new(NewsSentimentTool::new(Arc::new(StaticNewsFeed::positive())))
        } else {
            Arc::new(NewsSentimentTool::new(Arc::new(UnavailableNewsFeed)))
        };

        CombinedAnalysisTool::new(price, news)
    }

    fn input(parameters: Value) -> ToolInput {
        ToolInput {
            tool_name: COMPREHENSIVE_ANALYSIS.to_string(),
            parameters,
        }
    }

    #[tokio::test]
    async fn test_both_sources_available() {
        let tool = combined(true, true);
        let output = tool
            .execute(&input(json!({"symbol": "AAPL", "period": "1month"})))
            .await
            .unwrap();

        assert!(output.success);
        assert!(output.data.get("price_analysis").unwrap().is_object());
        assert_eq!(
            output.data.pointer("/sentiment_analysis/overall_sentiment"),
            Some(&json!("positive"))
        );
        let insights = output.data.get("key_insights").unwrap().as_array().unwrap();
        assert!(!insights.is_empty());
        assert_eq!(output.data.get("insufficient_data"), None);
    }

    #[tokio::test]
    async fn test_price_leg_failure_degrades_without_fabrication() {
        let tool = combined(false, true);
        let output = tool.execute(&input(json!({"symbol": "TSLA"}))).await.unwrap();

        assert!(output.success);
        assert!(output.data.get("price_analysis").unwrap().is_null());
        assert_eq!(
            output.data.pointer("/sentiment_analysis/overall_sentiment"),
            Some(&json!("positive"))
        );
        let insights = serde_json::to_string(output.data.get("key_insights").unwrap()).unwrap();
        assert!(insights.contains("Price data is currently unavailable"));
    }

    #[tokio::test]
    async fn test_news_leg_degraded_keeps_price_insights() {
        let tool = combined(true, false);
        let output = tool.execute(&input(json!({"symbol": "AAPL"}))).await.unwrap();

        assert!(output.success);
        assert!(output.data.get("price_analysis").unwrap().is_object());
        let insights = serde_json::to_string(output.data.get("key_insights").unwrap()).unwrap();
        assert!(insights.contains("News sentiment is currently unavailable"));
    }

    #[tokio::test]
    async fn test_both_legs_down_reports_insufficient_data() {
        let tool = combined(false, false);
        let output = tool.execute(&input(json!({"symbol": "ZZZZ"}))).await.unwrap();

        assert!(output.success);
        assert_eq!(output.data.get("insufficient_data"), Some(&json!(true)));
        let summary = output.data.get("summary").unwrap().as_str().unwrap();
        assert!(summary.contains("Insufficient data"));
        // nothing numeric is invented
        assert_eq!(output.data.get("price_analysis"), None);
        assert_eq!(output.data.get("sentiment_analysis"), None);
    }

    #[tokio::test]
    async fn test_invalid_period_propagates_as_contract_error() {
        let tool = combined(true, true);
        let err = tool
            .execute(&input(json!({"symbol": "AAPL", "period": "decade"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidPeriod(_)));
    }
}
