use financial_agent_api::{
    agent::FinancialAgent,
    api::start_server,
    completion::{CompletionModel, GeminiModel},
    config::Settings,
    health::HealthRegistry,
    models::AgentType,
    service::AgentService,
    tools::{NewsApiFeed, NewsFeed, PriceFeed, ToolRegistry, YahooFinanceFeed},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();
    let settings = Settings::from_env();

    if settings.gemini_api_key.is_none() {
        eprintln!("GEMINI_API_KEY not set in .env - chat requests will fail until it is configured");
    }
    if settings.news_api_key.is_none() {
        eprintln!("NEWS_API_KEY not set in .env - news sentiment will run in degraded mode");
    }

    info!("Financial Agent API");
    info!("Port: {}", settings.api_port);

    // Create components
    let completion: Arc<dyn CompletionModel> = Arc::new(GeminiModel::new(
        settings.gemini_api_key.clone().unwrap_or_default(),
    ));
    let price_feed: Arc<dyn PriceFeed> = Arc::new(YahooFinanceFeed::new());
    let news_feed: Arc<dyn NewsFeed> = Arc::new(NewsApiFeed::new(settings.news_api_key.clone()));

    let registry = Arc::new(ToolRegistry::new(price_feed, news_feed));
    let agent = Arc::new(FinancialAgent::new(completion.clone(), registry.clone()));
    let health = HealthRegistry::new(completion, registry);
    let service = Arc::new(AgentService::new(agent, health));

    let status = service.probe_health(AgentType::FinancialManager).await;
    info!(
        available = status.is_available,
        version = status.version.as_str(),
        "Financial Manager agent initialized"
    );

    info!("Starting API server...");
    start_server(service, settings).await?;

    Ok(())
}
