use std::env;
use std::time::Duration;

use crate::stat_normalizer::InversionPolicy;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_GAME: &str = "valorant";

/// Runtime configuration, read from the environment (after `.env` files are loaded).
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub page_size: usize,
    pub cluster_page_size: usize,
    pub request_timeout: Duration,
    pub default_game: String,
    pub inverted_metrics: InversionPolicy,
    pub demo: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            page_size: 10,
            cluster_page_size: 15,
            request_timeout: Duration::from_secs(10),
            default_game: DEFAULT_GAME.to_string(),
            inverted_metrics: InversionPolicy::default(),
            demo: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_base_url = env::var("STATS_API_URL")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_base_url);
        let page_size = env::var("STATS_PAGE_SIZE")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(defaults.page_size)
            .clamp(1, 100);
        let cluster_page_size = env::var("CLUSTER_PAGE_SIZE")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(defaults.cluster_page_size)
            .clamp(1, 200);
        let timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(10)
            .clamp(1, 120);
        let default_game = env::var("DEFAULT_GAME")
            .ok()
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.default_game);
        let inverted_metrics = env::var("INVERTED_METRICS")
            .ok()
            .map(|raw| InversionPolicy::parse(&raw))
            .unwrap_or(defaults.inverted_metrics);
        let demo = env::var("STATS_DEMO")
            .ok()
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            api_base_url,
            page_size,
            cluster_page_size,
            request_timeout: Duration::from_secs(timeout_secs),
            default_game,
            inverted_metrics,
            demo,
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}
