use healthwatch_core::store::Store;
use healthwatch_core::Config;
use healthwatch_orchestrator::{ScanOrchestrator, WeeklyOrchestrator};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub scan: Arc<ScanOrchestrator>,
    pub weekly: Arc<WeeklyOrchestrator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = Store::new(config.persistence_url.clone(), config.persistence_service_key.clone());
        let scan = Arc::new(healthwatch_orchestrator::build_scan_orchestrator(&config));
        let weekly = Arc::new(healthwatch_orchestrator::build_weekly_orchestrator(&config));
        Self { store, scan, weekly, config: Arc::new(config) }
    }
}
