//! Core data models for the financial agent service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::AgentError;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    FinancialManager,
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentType::FinancialManager => write!(f, "financial_manager"),
        }
    }
}

/// Bounded set of analysis durations accepted by the price tool
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnalysisPeriod {
    #[serde(rename = "1week")]
    OneWeek,
    #[serde(rename = "2weeks")]
    TwoWeeks,
    #[serde(rename = "1month")]
    OneMonth,
    #[serde(rename = "3months")]
    ThreeMonths,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "1year")]
    OneYear,
}

impl AnalysisPeriod {
    /// Parse a caller-supplied period string, rejecting unsupported values
    /// before any external call is made.
    pub fn parse(value: &str) -> crate::Result<Self> {
        match value {
            "1week" => Ok(AnalysisPeriod::OneWeek),
            "2weeks" => Ok(AnalysisPeriod::TwoWeeks),
            "1month" => Ok(AnalysisPeriod::OneMonth),
            "3months" => Ok(AnalysisPeriod::ThreeMonths),
            "6months" => Ok(AnalysisPeriod::SixMonths),
            "1year" => Ok(AnalysisPeriod::OneYear),
            other => Err(AgentError::InvalidPeriod(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPeriod::OneWeek => "1week",
            AnalysisPeriod::TwoWeeks => "2weeks",
            AnalysisPeriod::OneMonth => "1month",
            AnalysisPeriod::ThreeMonths => "3months",
            AnalysisPeriod::SixMonths => "6months",
            AnalysisPeriod::OneYear => "1year",
        }
    }

    /// Range parameter understood by the Yahoo Finance chart API
    pub fn yahoo_range(&self) -> &'static str {
        match self {
            AnalysisPeriod::OneWeek => "5d",
            AnalysisPeriod::TwoWeeks => "10d",
            AnalysisPeriod::OneMonth => "1mo",
            AnalysisPeriod::ThreeMonths => "3mo",
            AnalysisPeriod::SixMonths => "6mo",
            AnalysisPeriod::OneYear => "1y",
        }
    }
}

impl fmt::Display for AnalysisPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

/// A tool invocation requested by the completion model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Declared schema for a tool, advertised to the completion model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

//
// ================= Agent Reply =================
//

/// Result of one agent run, before the exchange is persisted
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    /// Names of the tools that fired, first-invocation order, no duplicates
    pub tools_invoked: Vec<String>,
    pub processing_time_ms: u64,
}

//
// ================= Chat Outcome =================
//

/// Reply plus metadata returned to the transport layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub response: String,
    pub conversation_id: Uuid,
    pub agent_type: AgentType,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub tool_used: bool,
    pub tools_invoked: Vec<String>,
}

//
// ================= Health =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealthStatus {
    pub agent_type: AgentType,
    pub is_available: bool,
    pub last_health_check: DateTime<Utc>,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse_known_values() {
        assert_eq!(
            AnalysisPeriod::parse("1month").unwrap(),
            AnalysisPeriod::OneMonth
        );
        assert_eq!(
            AnalysisPeriod::parse("1year").unwrap().yahoo_range(),
            "1y"
        );
    }

    #[test]
    fn test_period_parse_rejects_unknown() {
        let err = AnalysisPeriod::parse("fortnight").unwrap_err();
        assert!(matches!(err, AgentError::InvalidPeriod(_)));
    }

    #[test]
    fn test_period_serde_round_trip() {
        let json = serde_json::to_string(&AnalysisPeriod::ThreeMonths).unwrap();
        assert_eq!(json, "\"3months\"");
        let parsed: AnalysisPeriod = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, AnalysisPeriod::ThreeMonths);
    }

    #[test]
    fn test_agent_type_serialization() {
        let json = serde_json::to_string(&AgentType::FinancialManager).unwrap();
        assert_eq!(json, "\"financial_manager\"");
    }
}
