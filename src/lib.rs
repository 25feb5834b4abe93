//! Financial Agent API
//!
//! A conversational financial analysis service that:
//! - Maintains multi-turn conversation sessions (volatile, process-lifetime)
//! - Lets the completion model decide which market-data tools to call
//! - Merges price and news-sentiment tool output into a single reply
//! - Degrades gracefully when a data source is down instead of failing
//! - Tracks per-agent availability via explicit health probes
//!
//! FLOW:
//! CHAT REQUEST → RESOLVE SESSION → AGENT RUN → TOOL CALL(S) → SYNTHESIZE → PERSIST EXCHANGE

pub mod agent;
pub mod api;
pub mod completion;
pub mod config;
pub mod error;
pub mod health;
pub mod memory;
pub mod models;
pub mod service;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use service::AgentService;
