//! Wires a [`Config`] into a ready-to-run [`ScanOrchestrator`]/[`WeeklyOrchestrator`].
//! Shared by the gateway and daemon entry points so neither duplicates the
//! token-broker/adapter construction.

use crate::{ScanOrchestrator, WeeklyOrchestrator};
use healthwatch_adapters::analytics::AnalyticsAdapter;
use healthwatch_adapters::cms::CmsAdapter;
use healthwatch_adapters::link_checker::LinkChecker;
use healthwatch_adapters::performance::PerformanceAdapter;
use healthwatch_adapters::search_index::SearchIndexAdapter;
use healthwatch_adapters::token_broker::TokenBroker;
use healthwatch_core::store::Store;
use healthwatch_core::Config;
use std::sync::Arc;

const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

pub fn build_scan_orchestrator(config: &Config) -> ScanOrchestrator {
    let store = Store::new(config.persistence_url.clone(), config.persistence_service_key.clone());
    let analytics_broker = TokenBroker::new(
        "analytics",
        store.clone(),
        GOOGLE_TOKEN_ENDPOINT,
        config.credential_client_id.clone(),
        config.credential_client_secret.clone(),
    );
    let search_broker = TokenBroker::new(
        "search_index",
        store.clone(),
        GOOGLE_TOKEN_ENDPOINT,
        config.credential_client_id.clone(),
        config.credential_client_secret.clone(),
    );

    ScanOrchestrator {
        store: store.clone(),
        analytics: AnalyticsAdapter::new(analytics_broker, config.analytics_property_id.clone()),
        search_index: Arc::new(SearchIndexAdapter::new(search_broker, config.search_index_site_url.clone())),
        performance: PerformanceAdapter::new(config.perf_api_key.clone()),
        cms: CmsAdapter::new(config.cms_api_token.clone()),
        link_checker: LinkChecker::new(config.base_site_origin.clone()),
        agent_llm_api_key: config.llm_api_key.clone(),
        agent_llm_model: config.llm_model.clone(),
        config: config.clone(),
    }
}

pub fn build_weekly_orchestrator(config: &Config) -> WeeklyOrchestrator {
    let store = Store::new(config.persistence_url.clone(), config.persistence_service_key.clone());
    let search_broker = TokenBroker::new(
        "search_index",
        store.clone(),
        GOOGLE_TOKEN_ENDPOINT,
        config.credential_client_id.clone(),
        config.credential_client_secret.clone(),
    );

    WeeklyOrchestrator {
        store,
        search_index: SearchIndexAdapter::new(search_broker, config.search_index_site_url.clone()),
        cms: CmsAdapter::new(config.cms_api_token.clone()),
        link_checker: LinkChecker::new(config.base_site_origin.clone()),
        agent_llm_api_key: config.llm_api_key.clone(),
        agent_llm_model: config.llm_model.clone(),
        config: config.clone(),
    }
}
