//! Environment-backed application settings
//!
//! Read once at startup. Secrets never leave the environment.

use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub environment: String,
    pub api_port: u16,
    pub gemini_api_key: Option<String>,
    pub news_api_key: Option<String>,
    pub cors_origins: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        let api_port = env::var("PORT")
            .or_else(|_| env::var("API_PORT"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        Self {
            app_name: env::var("APP_NAME")
                .unwrap_or_else(|_| "Financial Agent API".to_string()),
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            api_port,
            gemini_api_key: non_empty(env::var("GEMINI_API_KEY").ok()),
            news_api_key: non_empty(env::var("NEWS_API_KEY").ok()),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_else(|_| {
                    vec![
                        "http://localhost:3000".to_string(),
                        "http://127.0.0.1:3000".to_string(),
                    ]
                }),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
