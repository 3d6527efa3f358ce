use std::sync::Arc;

use chrono::{Local, NaiveDate};
use droughtwatch_core::{
    CalibrationCalendar, Config, PipelineOrchestrator, ProductCatalog, RunHistory,
    SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<PipelineOrchestrator>,
    history: Option<Arc<dyn RunHistory>>,
    products: ProductCatalog,
    fixed_today: Option<NaiveDate>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<PipelineOrchestrator>,
        history: Option<Arc<dyn RunHistory>>,
        products: ProductCatalog,
    ) -> Self {
        Self {
            config,
            orchestrator,
            history,
            products,
            fixed_today: None,
        }
    }

    /// Pin the date the endpoints use instead of the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &PipelineOrchestrator {
        &self.orchestrator
    }

    pub fn calendar(&self) -> &CalibrationCalendar {
        self.orchestrator.calendar()
    }

    pub fn history(&self) -> Option<&Arc<dyn RunHistory>> {
        self.history.as_ref()
    }

    pub fn products(&self) -> &ProductCatalog {
        &self.products
    }
}
