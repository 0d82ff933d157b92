use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::services::session::SessionConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,

    // Analysis Service
    pub analysis_service_url: String,
    pub analysis_service_token: String,
    pub analysis_service_timeout_seconds: u64,

    // Polling
    pub poll_interval_ms: u64,
    pub poll_timeout_seconds: u64,

    // Source documents
    pub document_categories: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::parse(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));

        // Analysis Service
        let analysis_service_url = env::var("ANALYSIS_SERVICE_URL")
            .unwrap_or_else(|_| "http://analysis-service:8000".to_string());
        url::Url::parse(&analysis_service_url).context("ANALYSIS_SERVICE_URL is not a valid URL")?;
        let analysis_service_token = env::var("ANALYSIS_SERVICE_TOKEN")
            .context("ANALYSIS_SERVICE_TOKEN must be set")?;
        let analysis_service_timeout_seconds = parse_or("ANALYSIS_SERVICE_TIMEOUT_SECONDS", 30);

        // Polling
        let poll_interval_ms = parse_or("ANALYSIS_POLL_INTERVAL_MS", 2500);
        let poll_timeout_seconds = parse_or("ANALYSIS_POLL_TIMEOUT_SECONDS", 60);

        // Source documents
        let document_categories = split_list(
            &env::var("ANALYSIS_DOCUMENT_CATEGORIES")
                .unwrap_or_else(|_| "inspection,inspection_report".to_string()),
        );

        Ok(Settings {
            env,
            analysis_service_url,
            analysis_service_token,
            analysis_service_timeout_seconds,
            poll_interval_ms,
            poll_timeout_seconds,
            document_categories,
        })
    }

    /// Session tuning derived from the environment.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_timeout: Duration::from_secs(self.poll_timeout_seconds),
            eligible_categories: self.document_categories.clone(),
        }
    }
}

fn parse_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
