use std::env;

const DEFAULT_AGENT_API_URL: &str = "https://conversational-ai-dev.algolia.com";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Search index
    pub algolia_app_id: String,
    pub algolia_search_api_key: String,
    pub algolia_index_name: String,

    // Guidance agent
    pub agent_api_url: String,
    pub agent_id: String,
    pub agent_api_key: String,

    /// Reject agent replies that don't match the guidance schema instead of
    /// falling back to a default suggestion.
    pub strict_replies: bool,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| panic!("{key} environment variable is required"))
        };

        Self {
            algolia_app_id: required("ALGOLIA_APP_ID"),
            algolia_search_api_key: required("ALGOLIA_SEARCH_API_KEY"),
            algolia_index_name: required("ALGOLIA_INDEX_NAME"),
            agent_api_url: lookup("AGENT_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_AGENT_API_URL.to_string()),
            agent_id: required("AGENT_ID"),
            agent_api_key: required("AGENT_API_KEY"),
            strict_replies: lookup("GUIDANCE_STRICT_REPLIES")
                .map(|v| v.parse().expect("GUIDANCE_STRICT_REPLIES must be true or false"))
                .unwrap_or(false),
        }
    }

    pub fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  ALGOLIA_APP_ID: {}", self.algolia_app_id);
        tracing::info!("  ALGOLIA_SEARCH_API_KEY: {}", preview(&self.algolia_search_api_key));
        tracing::info!("  ALGOLIA_INDEX_NAME: {}", self.algolia_index_name);
        tracing::info!("  AGENT_API_URL: {}", self.agent_api_url);
        tracing::info!("  AGENT_ID: {}", self.agent_id);
        tracing::info!("  AGENT_API_KEY: {}", preview(&self.agent_api_key));
        tracing::info!("  GUIDANCE_STRICT_REPLIES: {}", self.strict_replies);
    }
}

/// First few characters of a secret, for startup logs.
fn preview(val: &str) -> String {
    let head: String = val.chars().take(4).collect();
    format!("{head}...({} chars)", val.chars().count())
}
