use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::core::config::FleetConfig;
use crate::core::error::{ControllerError, ResolverError};
use crate::model::component::{Catalog, Component, Image};
use crate::model::desired::RecordKey;
use crate::model::timeline::DesiredImageTimeline;
use crate::resolver::registry::ResolverRegistry;
use crate::service::reconciler_svc::DesiredStateReconciler;
use crate::service::reporter::{MissingImage, Reporter};
use crate::service::work_queue::{ExponentialBackoff, RateLimitedQueue};

pub const LIVENESS_METRIC_NAME: &str = "tagwatch_liveness";
pub const TEAMS_METRIC_NAME: &str = "tagwatch_teams";
pub const DESIRED_VERSION_UPDATED_METRIC_NAME: &str = "tagwatch_desired_version_updated";
pub const MISSING_IMAGE_METRIC_NAME: &str = "tagwatch_missing_image";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateLimitedEvent {
    ComponentChanged { name: String, repository: Option<String> },
    UpdateDesired { team: String, component: String, source: String, image: Image },
    HealthTick,
    MetricTick,
}

/// Lookup of the image a component currently runs, in `repository:tag` form.
pub trait ActiveImages: Send + Sync {
    fn active_image(&self, team: &str, component: &str) -> Option<String>;
}

pub struct NoActiveImages;

impl ActiveImages for NoActiveImages {
    fn active_image(&self, _team: &str, _component: &str) -> Option<String> {
        None
    }
}

/// Event loop keeping the desired state of every team's components up to date.
#[derive(Clone)]
pub struct FleetLoop {
    config: FleetConfig,
    queue: RateLimitedQueue<RateLimitedEvent>,
    registry: ResolverRegistry,
    reconciler: DesiredStateReconciler,
    reporters: Arc<Vec<Arc<dyn Reporter>>>,
    active: Arc<dyn ActiveImages>,
    teams: Arc<Mutex<HashMap<String, Catalog>>>,
    timelines: Arc<DashMap<(String, String), DesiredImageTimeline>>,
}

impl FleetLoop {
    pub fn new(
        config: FleetConfig,
        registry: ResolverRegistry,
        reconciler: DesiredStateReconciler,
        reporters: Vec<Arc<dyn Reporter>>,
        active: Arc<dyn ActiveImages>,
    ) -> Self {
        let backoff = ExponentialBackoff {
            base: config.backoff_base(),
            max: config.backoff_max(),
        };
        Self {
            config,
            queue: RateLimitedQueue::new(backoff),
            registry,
            reconciler,
            reporters: Arc::new(reporters),
            active,
            teams: Default::default(),
            timelines: Default::default(),
        }
    }

    /// Replaces the catalog of `team` and refreshes the team count.
    pub async fn set_team_catalog(&self, team: &str, components: &[Component]) -> usize {
        let registry = self.registry.clone();
        let catalog = Catalog::flatten(components, |source| registry.is_registered(source));
        let size = catalog.len();

        let mut teams = self.teams.lock().await;
        teams.insert(String::from(team), catalog);
        metrics::gauge!(TEAMS_METRIC_NAME).set(teams.len() as f64);
        log::info!("Catalog of team {team} set with {size} checkable components");
        size
    }

    pub async fn teams_count(&self) -> usize {
        self.teams.lock().await.len()
    }

    pub fn enqueue(&self, event: RateLimitedEvent) {
        self.queue.add(event);
    }

    pub fn component_changed(&self, name: &str, repository: Option<&str>) {
        self.enqueue(RateLimitedEvent::ComponentChanged {
            name: String::from(name),
            repository: repository.map(String::from),
        });
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn timeline(&self, team: &str, component: &str) -> Option<DesiredImageTimeline> {
        self.timelines.get(&(String::from(team), String::from(component)))
            .map(|entry| entry.value().clone())
    }

    /// Spawns the worker pool and schedules the startup ticks.
    pub fn start(&self) {
        let workers = self.config.workers.max(1);
        for idx in 0..workers {
            let fleet = self.clone();
            tokio::spawn(async move {
                fleet.run_worker(idx).await;
            });
        }
        self.enqueue(RateLimitedEvent::HealthTick);
        self.enqueue(RateLimitedEvent::MetricTick);
        log::info!("Fleet loop started with {workers} workers");
    }

    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    async fn run_worker(&self, idx: usize) {
        while let Some(event) = self.queue.get().await {
            match self.handle(&event).await {
                Ok(()) => self.queue.forget(&event),
                Err(err) if err.is_permanent() => {
                    log::error!("Worker {idx} dropping {event:?} - {err}");
                    self.queue.forget(&event);
                }
                Err(err) => {
                    log::warn!("Worker {idx} failed handling {event:?} (requeues {}) - {err}", self.queue.num_requeues(&event));
                    self.queue.add_rate_limited(event.clone());
                }
            }
            self.queue.done(&event);
        }
        log::debug!("Fleet worker {idx} exiting");
    }

    pub async fn handle(&self, event: &RateLimitedEvent) -> Result<(), ControllerError> {
        match event {
            RateLimitedEvent::ComponentChanged { name, repository } => {
                self.fan_out(name, repository.as_deref()).await;
                Ok(())
            }
            RateLimitedEvent::UpdateDesired { team, component, source, image } => {
                self.update_desired(team, component, source, image).await
            }
            RateLimitedEvent::HealthTick => {
                metrics::gauge!(LIVENESS_METRIC_NAME).set(1.0);
                self.queue.add_after(RateLimitedEvent::HealthTick, self.config.health_interval());
                Ok(())
            }
            RateLimitedEvent::MetricTick => {
                let teams = self.teams_count().await;
                metrics::gauge!(TEAMS_METRIC_NAME).set(teams as f64);
                Ok(())
            }
        }
    }

    async fn fan_out(&self, name: &str, repository: Option<&str>) -> usize {
        let teams = self.teams.lock().await;
        let mut enqueued = 0;
        for (team, catalog) in teams.iter() {
            let matching = catalog.iter()
                .filter(|component| component.name.eq(name))
                .filter(|component| repository.map(|repo| component.image.repository.eq(repo)).unwrap_or(true));

            for component in matching {
                let Some(source) = component.source.as_ref().filter(|source| self.registry.is_registered(source)) else {
                    continue;
                };
                self.queue.add(RateLimitedEvent::UpdateDesired {
                    team: team.clone(),
                    component: component.name.clone(),
                    source: source.clone(),
                    image: component.image.clone(),
                });
                enqueued += 1;
            }
        }
        log::debug!("Change of {name} fanned out to {enqueued} updates");
        enqueued
    }

    async fn update_desired(&self, team: &str, component: &str, source: &str, image: &Image) -> Result<(), ControllerError> {
        let resolver = self.registry.dispatch(source)
            .ok_or_else(|| ControllerError::UnknownSource(String::from(source)))?;

        match resolver.resolve(&image.repository, component, image.pattern_or_empty()).await {
            Err(err) if err.is_soft() => {
                self.record_timeline(team, component, |timeline| timeline.record_missing(&image.repository, Utc::now()));
                self.notify_missing(team, component, source, image, &err).await;
                Ok(())
            }
            Err(err) => Err(err.into()),
            Ok(version) => {
                let reference = image.reference(&version);
                self.record_timeline(team, component, |timeline| timeline.record_resolved(&reference, Utc::now()));
                self.reconciler.reconcile(team, component, &version, &image.repository).await?;
                self.refresh_updated_metric(team, component).await;
                Ok(())
            }
        }
    }

    /// Applies `record` to the timeline of the component, then prunes it to the retention bound.
    fn record_timeline<F>(&self, team: &str, component: &str, record: F)
        where F: FnOnce(&mut DesiredImageTimeline),
    {
        let active = self.active.active_image(team, component);
        let mut timeline = self.timelines.entry((String::from(team), String::from(component))).or_default();
        record(timeline.value_mut());
        let pruned = timeline.prune(self.config.retention, active.as_deref());
        if !pruned.is_empty() {
            log::debug!("Pruned {} timeline entries of {team}/{component}", pruned.len());
        }
    }

    async fn notify_missing(&self, team: &str, component: &str, source: &str, image: &Image, err: &ResolverError) {
        metrics::counter!(MISSING_IMAGE_METRIC_NAME, "team" => String::from(team)).increment(1);
        let event = MissingImage {
            team: String::from(team),
            component: String::from(component),
            repository: image.repository.clone(),
            source: String::from(source),
            reason: err.to_string(),
            detected_at: Utc::now(),
        };
        for reporter in self.reporters.iter() {
            if let Err(err) = reporter.report_missing_image(&event).await {
                log::warn!("Error reporting missing image of {team}/{component} - {err:#}");
            }
        }
    }

    async fn refresh_updated_metric(&self, team: &str, component: &str) {
        match self.reconciler.store().get(&RecordKey::new(team, component)).await {
            Ok(Some(record)) => {
                metrics::gauge!(
                    DESIRED_VERSION_UPDATED_METRIC_NAME,
                    "team" => String::from(team),
                    "component" => String::from(component)
                ).set(record.updated_at.timestamp() as f64);
            }
            Ok(None) => log::debug!("Record {team}/{component} vanished before metric refresh"),
            Err(err) => log::debug!("Could not refresh metric of {team}/{component} - {err}"),
        }
    }
}
