use std::sync::Arc;

use axum::extract::FromRef;

use crate::core::config::{StoreKind, TagwatchConfig};
use crate::core::error::ControllerError;
use crate::resolver::registry::ResolverRegistry;
use crate::service::catalog_controller::CatalogController;
use crate::service::catalog_source::{CatalogSource, FileCatalogSource, StaticCatalogSource};
use crate::service::fleet_loop::{FleetLoop, NoActiveImages};
use crate::service::reconciler_svc::DesiredStateReconciler;
use crate::service::reporter::build_reporters;
use crate::store::DesiredStateStore;
use crate::store::kube_store::KubeStore;
use crate::store::memory::MemoryStore;

#[derive(Clone)]
pub struct TagwatchState {
    tagwatch_cfg: Arc<TagwatchConfig>,
    registry: ResolverRegistry,
    store: Arc<dyn DesiredStateStore>,
    catalog_ctrl: CatalogController,
    fleet: FleetLoop,
}

impl TagwatchState {
    pub async fn build(app_config: TagwatchConfig) -> Result<Self, ControllerError> {
        let registry = ResolverRegistry::with_builtins(&app_config.resolver);
        let store: Arc<dyn DesiredStateStore> = match app_config.store.kind {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::Kubernetes => Arc::new(KubeStore::try_default().await?),
        };
        Ok(Self::with_store(app_config, registry, store))
    }

    pub fn with_store(app_config: TagwatchConfig, registry: ResolverRegistry, store: Arc<dyn DesiredStateStore>) -> Self {
        let reconciler = DesiredStateReconciler::new(store.clone());
        let source: Arc<dyn CatalogSource> = match &app_config.catalog_path {
            Some(path) => Arc::new(FileCatalogSource::new(path)),
            None => Arc::new(StaticCatalogSource::default()),
        };
        let catalog_ctrl = CatalogController::new(&app_config.namespace, registry.clone(), reconciler.clone(), source);
        let fleet = FleetLoop::new(
            app_config.fleet.clone(),
            registry.clone(),
            reconciler,
            build_reporters(&app_config.reporters),
            Arc::new(NoActiveImages),
        );

        Self {
            tagwatch_cfg: Arc::new(app_config),
            registry,
            store,
            catalog_ctrl,
            fleet,
        }
    }

    /// Loads every configured catalog and starts both controllers.
    pub async fn start(&self) -> Result<(), ControllerError> {
        self.catalog_ctrl.load().await?;
        for (team, path) in self.tagwatch_cfg.teams.iter() {
            let components = FileCatalogSource::new(path).load().await?;
            self.fleet.set_team_catalog(team, &components).await;
        }
        self.catalog_ctrl.start();
        self.fleet.start();
        Ok(())
    }

    pub fn stop(&self) {
        self.catalog_ctrl.stop();
        self.fleet.shutdown();
    }
}

impl FromRef<TagwatchState> for Arc<TagwatchConfig> {
    fn from_ref(app_state: &TagwatchState) -> Self {
        app_state.tagwatch_cfg.clone()
    }
}

impl FromRef<TagwatchState> for ResolverRegistry {
    fn from_ref(app_state: &TagwatchState) -> Self {
        app_state.registry.clone()
    }
}

impl FromRef<TagwatchState> for Arc<dyn DesiredStateStore> {
    fn from_ref(app_state: &TagwatchState) -> Self {
        app_state.store.clone()
    }
}

impl FromRef<TagwatchState> for CatalogController {
    fn from_ref(app_state: &TagwatchState) -> Self {
        app_state.catalog_ctrl.clone()
    }
}

impl FromRef<TagwatchState> for FleetLoop {
    fn from_ref(app_state: &TagwatchState) -> Self {
        app_state.fleet.clone()
    }
}
