use std::sync::Arc;

use chrono::Duration;
use planner_core::model::WeaknessRegistry;
use storage::repository::Storage;

use crate::Clock;
use crate::api::{HttpPlannerApi, PlannerApi};
use crate::config::PlannerConfig;
use crate::error::AppServicesError;
use crate::planner_service::PlannerService;

/// Assembles app-facing services from configuration.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    config: PlannerConfig,
    planner: Arc<PlannerService>,
}

impl AppServices {
    /// Build services backed by `SQLite` snapshot storage and the HTTP planner.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or HTTP client setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: PlannerConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let api: Arc<dyn PlannerApi> = Arc::new(HttpPlannerApi::new(config.clone())?);
        Ok(Self::from_parts(clock, config, api, storage))
    }

    /// Build services with an arbitrary API and storage; used by tests and tooling.
    #[must_use]
    pub fn from_parts(
        clock: Clock,
        config: PlannerConfig,
        api: Arc<dyn PlannerApi>,
        storage: Storage,
    ) -> Self {
        let planner =
            Arc::new(PlannerService::new(clock, api).with_snapshots(Arc::clone(&storage.snapshots)));
        Self {
            clock,
            config,
            planner,
        }
    }

    #[must_use]
    pub fn planner(&self) -> Arc<PlannerService> {
        Arc::clone(&self.planner)
    }

    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Fresh registry using the configured debounce window.
    #[must_use]
    pub fn new_registry(&self) -> WeaknessRegistry {
        WeaknessRegistry::new(self.clock)
            .with_debounce(Duration::milliseconds(self.config.debounce_ms))
    }
}
