//! Process-wide configuration loaded once and passed explicitly (§9 "Global
//! configuration"): no ambient `env::var` reads inside adapters, so tests
//! stay deterministic.

use serde::{Deserialize, Serialize};

fn default_scan_deadline_secs() -> u64 {
    120
}

fn default_speed_check_cutoff_secs() -> u64 {
    50
}

fn default_agent_loop_cutoff_secs() -> u64 {
    80
}

fn default_agent_max_tool_calls() -> u32 {
    6
}

fn default_agent_max_duration_ms() -> u64 {
    40_000
}

fn default_flagged_pages_per_scan() -> usize {
    1
}

fn default_llm_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_link_check_timeout_secs() -> u64 {
    10
}

fn default_html_fetch_timeout_secs() -> u64 {
    5
}

fn default_max_redirects() -> usize {
    5
}

/// Loaded once per process (gateway or daemon `main`) via [`Config::load`].
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | HEALTHWATCH_PORT | 8080 | Gateway HTTP port |
/// | HEALTHWATCH_PERSISTENCE_URL | — | Base URL of the PostgREST-compatible store |
/// | HEALTHWATCH_PERSISTENCE_SERVICE_KEY | — | Service-role key sent as `apikey`/`Authorization: Bearer` |
/// | HEALTHWATCH_CREDENTIAL_CLIENT_ID / _SECRET / _REDIRECT_URI | — | OAuth client-credentials for analytics/search-index |
/// | HEALTHWATCH_ANALYTICS_PROPERTY_ID | — | Web analytics property id |
/// | HEALTHWATCH_SEARCH_INDEX_SITE_URL | — | Search-index verified site URL |
/// | HEALTHWATCH_PERF_API_KEY | — | Performance-tester API key |
/// | HEALTHWATCH_CMS_API_TOKEN | — | CMS private-app token |
/// | HEALTHWATCH_BASE_SITE_ORIGIN | — | Origin used to resolve relative sitemap/link URLs |
/// | HEALTHWATCH_LLM_API_KEY | — | Language-model API key for the agent loop + weekly digest |
/// | HEALTHWATCH_LLM_MODEL | claude-sonnet-4-5 | Model id passed to the LLM client |
/// | HEALTHWATCH_TRIGGER_SHARED_SECRET | — | Bearer token required on scheduled/manual trigger endpoints |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    pub persistence_url: String,
    pub persistence_service_key: String,

    pub credential_client_id: String,
    pub credential_client_secret: String,
    #[serde(default)]
    pub credential_redirect_uri: Option<String>,

    pub analytics_property_id: String,
    pub search_index_site_url: String,
    pub perf_api_key: String,
    pub cms_api_token: String,
    pub base_site_origin: String,

    pub llm_api_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    pub trigger_shared_secret: String,

    #[serde(default = "default_scan_deadline_secs")]
    pub scan_deadline_secs: u64,
    #[serde(default = "default_speed_check_cutoff_secs")]
    pub speed_check_cutoff_secs: u64,
    #[serde(default = "default_agent_loop_cutoff_secs")]
    pub agent_loop_cutoff_secs: u64,
    #[serde(default = "default_flagged_pages_per_scan")]
    pub flagged_pages_per_scan: usize,

    #[serde(default = "default_agent_max_tool_calls")]
    pub agent_max_tool_calls: u32,
    #[serde(default = "default_agent_max_duration_ms")]
    pub agent_max_duration_ms: u64,

    #[serde(default = "default_link_check_timeout_secs")]
    pub link_check_timeout_secs: u64,
    #[serde(default = "default_html_fetch_timeout_secs")]
    pub html_fetch_timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Config {
    /// Load from environment (optionally layered over `config/healthwatch.toml` if present).
    /// Precedence: env `HEALTHWATCH_CONFIG` path > `config/healthwatch.toml` > defaults,
    /// with `HEALTHWATCH_*` environment variables applied last.
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let config_path =
            std::env::var("HEALTHWATCH_CONFIG").unwrap_or_else(|_| "config/healthwatch.toml".to_string());

        let builder = config::Config::builder()
            .set_default("port", 8080_i64)?
            .set_default("scan_deadline_secs", 120_i64)?
            .set_default("speed_check_cutoff_secs", 50_i64)?
            .set_default("agent_loop_cutoff_secs", 80_i64)?
            .set_default("flagged_pages_per_scan", 1_i64)?
            .set_default("agent_max_tool_calls", 6_i64)?
            .set_default("agent_max_duration_ms", 40_000_i64)?
            .set_default("link_check_timeout_secs", 10_i64)?
            .set_default("html_fetch_timeout_secs", 5_i64)?
            .set_default("max_redirects", 5_i64)?
            .set_default("llm_model", "claude-sonnet-4-5")?;

        let path = std::path::Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("HEALTHWATCH").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}
