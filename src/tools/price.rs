//! Price analysis tool
//!
//! Wraps the market price feed and computes a technical snapshot:
//! trend direction, support/resistance, moving averages, volume trend.
//! Uses the Yahoo Finance chart API for real data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::AgentError;
use crate::models::{AnalysisPeriod, ToolInput, ToolOutput};
use crate::Result;

use super::{Tool, PRICE_ANALYSIS};

/// Bare crypto tickers that Yahoo quotes as a -USD pair
const CRYPTO_SYMBOLS: &[&str] = &[
    "BTC", "ETH", "USDT", "BNB", "XRP", "SOL", "USDC", "DOGE", "ADA", "TRX", "LINK", "LTC", "BCH",
    "XLM", "AVAX", "ATOM", "ALGO", "FIL", "ETC", "XMR",
];

/// Exchange suffixes that mark an already-qualified symbol
const SYMBOL_SUFFIXES: &[&str] = &["-USD", ".SA", ".AX", ".L", ".TO"];

/// One daily bar of market data from the price feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

/// Capability interface for fetching a historical price series
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch(&self, symbol: &str, period: AnalysisPeriod) -> Result<Vec<PricePoint>>;
}

/// Yahoo Finance chart API backed feed
pub struct YahooFinanceFeed {
    client: Client,
    base_url: String,
}

impl YahooFinanceFeed {
    pub fn new() -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
        }
    }
}

impl Default for YahooFinanceFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceFeed for YahooFinanceFeed {
    async fn fetch(&self, symbol: &str, period: AnalysisPeriod) -> Result<Vec<PricePoint>> {
        let url = format!("{}/{}", self.base_url, symbol);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("range", period.yahoo_range()),
                ("interval", "1d"),
                ("includePrePost", "false"),
            ])
            .header(
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            )
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::UpstreamTimeout(format!("Price feed timed out for {}", symbol))
                } else {
                    AgentError::DataUnavailable(format!("Price feed request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(AgentError::DataUnavailable(format!(
                "Price feed returned {} for {}",
                response.status(),
                symbol
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            AgentError::DataUnavailable(format!("Invalid price feed response: {}", e))
        })?;

        let points = parse_chart_response(&data);
        if points.is_empty() {
            return Err(AgentError::DataUnavailable(format!(
                "No price data for symbol {}",
                symbol
            )));
        }

        Ok(points)
    }
}

fn parse_chart_response(data: &Value) -> Vec<PricePoint> {
    let quote = match data
        .pointer("/chart/result/0/indicators/quote/0")
        .and_then(Value::as_object)
    {
        Some(quote) => quote,
        None => return Vec::new(),
    };

    let series = |key: &str| -> Vec<Option<f64>> {
        quote
            .get(key)
            .and_then(Value::as_array)
            .map(|values| values.iter().map(Value::as_f64).collect())
            .unwrap_or_default()
    };

    let closes = series("close");
    let highs = series("high");
    let lows = series("low");
    let volumes = series("volume");

    let mut points = Vec::with_capacity(closes.len());
    for (i, close) in closes.iter().enumerate() {
        // bars with a null close are holiday/halted entries; skip them
        let close = match close {
            Some(close) => *close,
            None => continue,
        };

        points.push(PricePoint {
            close,
            high: highs.get(i).copied().flatten().unwrap_or(close),
            low: lows.get(i).copied().flatten().unwrap_or(close),
            volume: volumes.get(i).copied().flatten().unwrap_or(0.0),
        });
    }

    points
}

//
// ================= Snapshot =================
//

/// Structured snapshot produced by the price analysis tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub current_price: f64,
    pub price_change_percentage: f64,
    pub price_range: String,
    pub trend_direction: String,
    pub volume_trend: String,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub moving_averages: MovingAverages,
    pub analysis_period: String,
    pub timestamp: DateTime<Utc>,
}

/// Simple moving averages; absent when the series is shorter than the window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingAverages {
    pub ma_20: Option<f64>,
    pub ma_50: Option<f64>,
}

pub struct PriceAnalysisTool {
    feed: Arc<dyn PriceFeed>,
}

impl PriceAnalysisTool {
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self { feed }
    }

    pub async fn analyze(&self, symbol: &str, period: AnalysisPeriod) -> Result<PriceSnapshot> {
        let formatted_symbol = normalize_symbol(symbol);
        let points = self.feed.fetch(&formatted_symbol, period).await?;

        info!(
            symbol = formatted_symbol.as_str(),
            bars = points.len(),
            "Price series fetched"
        );

        Ok(build_snapshot(symbol, period, &points))
    }
}

#[async_trait]
impl Tool for PriceAnalysisTool {
    fn name(&self) -> &'static str {
        PRICE_ANALYSIS
    }

    fn description(&self) -> &'static str {
        "Get price data, trend direction, support/resistance and moving averages for a stock or cryptocurrency"
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
        let (symbol, period) = parse_symbol_and_period(input)?;
        let snapshot = self.analyze(&symbol, period).await?;

        Ok(ToolOutput {
            success: true,
            data: serde_json::to_value(snapshot)?,
            error: None,
        })
    }
}

/// Shared argument validation for the price-shaped tools.
/// Contract violations are rejected before any external call.
pub(crate) fn parse_symbol_and_period(input: &ToolInput) -> Result<(String, AnalysisPeriod)> {
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

    let period = match input.parameters.get("period").and_then(Value::as_str) {
        Some(raw) => AnalysisPeriod::parse(raw)?,
        None => AnalysisPeriod::OneMonth,
    };

    Ok((symbol.to_string(), period))
}

/// Qualify bare crypto tickers with their -USD pair; leave suffixed
/// symbols untouched.
fn normalize_symbol(symbol: &str) -> String {
    let upper = symbol.to_uppercase();

    if SYMBOL_SUFFIXES.iter().any(|suffix| upper.contains(suffix)) {
        return upper;
    }

    if CRYPTO_SYMBOLS.contains(&upper.as_str()) {
        format!("{}-USD", upper)
    } else {
        upper
    }
}

fn build_snapshot(symbol: &str, period: AnalysisPeriod, points: &[PricePoint]) -> PriceSnapshot {
    let closes: Vec<f64> = points.iter().map(|p| p.close).collect();
    let highs: Vec<f64> = points.iter().map(|p| p.high).collect();
    let lows: Vec<f64> = points.iter().map(|p| p.low).collect();
    let volumes: Vec<f64> = points.iter().map(|p| p.volume).collect();

    let current_price = closes.last().copied().unwrap_or(0.0);
    let start_price = closes.first().copied().unwrap_or(current_price);
    let price_change_pct = if start_price != 0.0 {
        round2((current_price - start_price) / start_price * 100.0)
    } else {
        0.0
    };

    let price_range = match (
        lows.iter().copied().reduce(f64::min),
        highs.iter().copied().reduce(f64::max),
    ) {
        (Some(low), Some(high)) => format!("${:.2}-${:.2}", low, high),
        _ => "N/A".to_string(),
    };

    PriceSnapshot {
        symbol: symbol.to_string(),
        current_price,
        price_change_percentage: price_change_pct,
        price_range,
        trend_direction: trend_direction(&closes).to_string(),
        volume_trend: volume_trend(&volumes).to_string(),
        support_levels: level_candidates(&lows, Level::Support),
        resistance_levels: level_candidates(&highs, Level::Resistance),
        moving_averages: MovingAverages {
            ma_20: moving_average(&closes, 20),
            ma_50: moving_average(&closes, 50),
        },
        analysis_period: period.as_str().to_string(),
        timestamp: Utc::now(),
    }
}

fn trend_direction(closes: &[f64]) -> &'static str {
    if closes.len() < 5 {
        return "neutral";
    }

    let last = closes[closes.len() - 1];
    let reference = closes[closes.len() - 5];

    if last > reference {
        "bullish"
    } else if last < reference {
        "bearish"
    } else {
        "neutral"
    }
}

fn volume_trend(volumes: &[f64]) -> &'static str {
    if volumes.len() < 5 {
        return "stable";
    }

    let recent = &volumes[volumes.len() - 5..];
    let recent_avg = recent.iter().sum::<f64>() / recent.len() as f64;

    let earlier = &volumes[volumes.len().saturating_sub(10)..volumes.len() - 5];
    let earlier_avg = if earlier.is_empty() {
        recent_avg
    } else {
        earlier.iter().sum::<f64>() / earlier.len() as f64
    };

    if recent_avg > earlier_avg {
        "increasing"
    } else {
        "decreasing"
    }
}

enum Level {
    Support,
    Resistance,
}

/// Period extreme plus a 10th/90th percentile level once enough bars exist
fn level_candidates(prices: &[f64], level: Level) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }

    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut levels = match level {
        Level::Support => vec![sorted[0]],
        Level::Resistance => vec![sorted[sorted.len() - 1]],
    };

    if sorted.len() > 10 {
        let index = match level {
            Level::Support => sorted.len() / 10,
            Level::Resistance => sorted.len() - (sorted.len() + 9) / 10,
        };
        levels.push(sorted[index]);
    }

    levels.into_iter().map(round2).collect()
}

/// Simple arithmetic mean over the trailing `window` closes; `None` when
/// the series is shorter than the window, never a short-window estimate.
fn moving_average(closes: &[f64], window: usize) -> Option<f64> {
    if closes.len() < window {
        return None;
    }

    let tail = &closes[closes.len() - window..];
    Some(round2(tail.iter().sum::<f64>() / window as f64))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
