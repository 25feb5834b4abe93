//! Agent health tracking
//!
//! Availability per agent type, refreshed only by explicit probes.
//! Status reads never re-probe.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::completion::CompletionModel;
use crate::models::{AgentHealthStatus, AgentType};
use crate::tools::ToolRegistry;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct HealthRegistry {
    completion: Arc<dyn CompletionModel>,
    registry: Arc<ToolRegistry>,
    statuses: RwLock<HashMap<AgentType, AgentHealthStatus>>,
}

impl HealthRegistry {
    pub fn new(completion: Arc<dyn CompletionModel>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            completion,
            registry,
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// Cheap liveness check. Never raises: any internal failure is
    /// recorded as unavailable.
    pub async fn probe(&self, agent_type: AgentType) -> AgentHealthStatus {
        let is_available = self.check(agent_type).await;
        if !is_available {
            warn!(agent_type = %agent_type, "Health probe found agent unavailable");
        }

        let status = AgentHealthStatus {
            agent_type,
            is_available,
            last_health_check: Utc::now(),
            version: AGENT_VERSION.to_string(),
        };

        let mut statuses = self.statuses.write().await;
        statuses.insert(agent_type, status.clone());

        status
    }

    async fn check(&self, agent_type: AgentType) -> bool {
        match agent_type {
            AgentType::FinancialManager => {
                if self.completion.name().is_empty() {
                    return false;
                }

                // every registered tool must be constructible
                for name in self.registry.known_tools() {
                    if self.registry.get(name).await.is_err() {
                        return false;
                    }
                }

                true
            }
        }
    }

    /// Last recorded status without re-probing
    pub async fn status(&self, agent_type: AgentType) -> Option<AgentHealthStatus> {
        self.statuses.read().await.get(&agent_type).cloned()
    }

    /// All recorded statuses
    pub async fn statuses(&self) -> Vec<AgentHealthStatus> {
        self.statuses.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::MockCompletionModel;
    use crate::tools::news::testing::StaticNewsFeed;
    use crate::tools::price::testing::StaticPriceFeed;

    fn health_registry() -> HealthRegistry {
        let registry = Arc::new(ToolRegistry::new(
            Arc::new(StaticPriceFeed::uptrend(30)),
            Arc::new(StaticNewsFeed::positive()),
        ));
        HealthRegistry::new(Arc::new(MockCompletionModel::unscripted()), registry)
    }

    #[tokio::test]
    async fn test_probe_records_status() {
        let health = health_registry();
        assert!(health.status(AgentType::FinancialManager).await.is_none());

        let status = health.probe(AgentType::FinancialManager).await;
        assert!(status.is_available);
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));

        let recorded = health.status(AgentType::FinancialManager).await.unwrap();
        assert!(recorded.is_available);
        assert_eq!(health.statuses().await.len(), 1);
    }

    #[tokio::test]
    async fn test_status_is_a_plain_read() {
        let health = health_registry();
        let probed = health.probe(AgentType::FinancialManager).await;
        let read = health.status(AgentType::FinancialManager).await.unwrap();
        // a status read does not refresh the check timestamp
        assert_eq!(probed.last_health_check, read.last_health_check);
    }
}
