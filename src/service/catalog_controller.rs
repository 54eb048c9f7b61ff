use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::error::ControllerError;
use crate::model::component::{Catalog, Image};
use crate::resolver::registry::ResolverRegistry;
use crate::service::catalog_source::CatalogSource;
use crate::service::reconciler_svc::{DesiredStateReconciler, ReconcileOutcome};

pub const MAX_RETRY_ON_FAILED: usize = 3;
pub const RESOLVE_FAILURES_METRIC_NAME: &str = "tagwatch_resolve_failures";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckJob {
    pub name: String,
    pub source: String,
    pub image: Image,
}

struct Handoff {
    job: CheckJob,
    taken: oneshot::Sender<()>,
}

#[derive(Default)]
struct Backlog {
    jobs: Vec<CheckJob>,
    in_flight: bool,
}

struct WorkerHandle {
    tx: mpsc::Sender<Handoff>,
    stop: CancellationToken,
}

/// On-demand checks for the component catalog of one namespace.
///
/// Jobs are handed to a single worker one at a time: a submitter waits until the worker picks its
/// job up, so callers are throttled by the worker pace.
#[derive(Clone)]
pub struct CatalogController {
    namespace: String,
    registry: ResolverRegistry,
    reconciler: DesiredStateReconciler,
    source: Arc<dyn CatalogSource>,
    catalog: Arc<RwLock<Catalog>>,
    worker: Arc<Mutex<Option<WorkerHandle>>>,
    backlog: Arc<Mutex<Backlog>>,
}

impl CatalogController {
    pub fn new(
        namespace: &str,
        registry: ResolverRegistry,
        reconciler: DesiredStateReconciler,
        source: Arc<dyn CatalogSource>,
    ) -> Self {
        Self {
            namespace: String::from(namespace),
            registry,
            reconciler,
            source,
            catalog: Default::default(),
            worker: Default::default(),
            backlog: Default::default(),
        }
    }

    /// Reloads the catalog from its source, returns the number of checkable entries.
    pub async fn load(&self) -> Result<usize, ControllerError> {
        let roots = self.source.load().await?;
        let registry = self.registry.clone();
        let catalog = Catalog::flatten(&roots, |source| registry.is_registered(source));
        let size = catalog.len();
        *self.catalog.write().await = catalog;
        log::info!("Catalog of {} loaded with {size} checkable components", self.namespace);
        Ok(size)
    }

    pub async fn catalog(&self) -> Catalog {
        self.catalog.read().await.clone()
    }

    fn worker(&self) -> MutexGuard<'_, Option<WorkerHandle>> {
        match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn backlog(&self) -> MutexGuard<'_, Backlog> {
        match self.backlog.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker().is_some()
    }

    pub fn start(&self) {
        let mut worker = self.worker();
        if worker.is_some() {
            log::warn!("Catalog controller of {} already started", self.namespace);
            return;
        }
        let (tx, rx) = mpsc::channel(1);
        let stop = CancellationToken::new();
        *worker = Some(WorkerHandle { tx, stop: stop.clone() });

        let controller = self.clone();
        tokio::spawn(async move {
            controller.run(rx, stop).await;
        });
        log::info!("Catalog controller of {} started", self.namespace);
    }

    pub fn stop(&self) {
        match self.worker().take() {
            Some(handle) => {
                handle.stop.cancel();
                log::info!("Catalog controller of {} stopped", self.namespace);
            }
            None => log::debug!("Catalog controller of {} not running", self.namespace),
        }
    }

    /// Jobs for the given names, or for the whole catalog when `names` is empty.
    /// Unknown names are skipped.
    pub async fn plan(&self, names: &[String]) -> Vec<CheckJob> {
        let catalog = self.catalog.read().await;
        let selected = catalog.iter()
            .filter(|component| names.is_empty() || names.contains(&component.name));

        if !names.is_empty() {
            names.iter()
                .filter(|name| catalog.get(name).is_none())
                .for_each(|name| log::debug!("Component {name} not in catalog of {}, ignoring", self.namespace));
        }

        selected
            .filter_map(|component| component.source.as_ref().map(|source| CheckJob {
                name: component.name.clone(),
                source: source.clone(),
                image: component.image.clone(),
            }))
            .collect()
    }

    /// Hands every job to the worker, returns the number taken before the worker stopped.
    pub async fn submit(&self, jobs: Vec<CheckJob>) -> Result<usize, ControllerError> {
        let tx = self.worker().as_ref()
            .map(|handle| handle.tx.clone())
            .ok_or(ControllerError::Stopped)?;

        let mut handed = 0;
        for job in jobs {
            let (taken_tx, taken_rx) = oneshot::channel();
            if tx.send(Handoff { job, taken: taken_tx }).await.is_err() || taken_rx.await.is_err() {
                log::warn!("Catalog worker of {} gone after {handed} jobs", self.namespace);
                return if handed > 0 { Ok(handed) } else { Err(ControllerError::Stopped) };
            }
            handed += 1;
        }
        Ok(handed)
    }

    /// Submits `jobs` from a background task without waiting for the worker.
    ///
    /// At most one background submission runs at a time: jobs handed in while it is running join
    /// its backlog, skipping those already waiting. Returns the backlog size after the merge.
    pub fn submit_detached(&self, jobs: Vec<CheckJob>) -> usize {
        let (size, spawn) = {
            let mut backlog = self.backlog();
            for job in jobs {
                if !backlog.jobs.contains(&job) {
                    backlog.jobs.push(job);
                }
            }
            let spawn = !backlog.in_flight && !backlog.jobs.is_empty();
            backlog.in_flight |= spawn;
            (backlog.jobs.len(), spawn)
        };
        if spawn {
            let controller = self.clone();
            tokio::spawn(async move {
                controller.drain_backlog().await;
            });
        }
        size
    }

    async fn drain_backlog(&self) {
        loop {
            let jobs = {
                let mut backlog = self.backlog();
                if backlog.jobs.is_empty() {
                    backlog.in_flight = false;
                    return;
                }
                std::mem::take(&mut backlog.jobs)
            };
            if let Err(err) = self.submit(jobs).await {
                let mut backlog = self.backlog();
                log::warn!("Check submission of {} interrupted, dropping {} waiting jobs - {err}", self.namespace, backlog.jobs.len());
                backlog.jobs.clear();
                backlog.in_flight = false;
                return;
            }
        }
    }

    pub async fn try_check(&self, names: &[String]) -> Result<usize, ControllerError> {
        let jobs = self.plan(names).await;
        self.submit(jobs).await
    }

    async fn run(&self, mut rx: mpsc::Receiver<Handoff>, stop: CancellationToken) {
        loop {
            let handoff = tokio::select! {
                _ = stop.cancelled() => break,
                handoff = rx.recv() => handoff,
            };
            let Some(Handoff { job, taken }) = handoff else {
                break;
            };
            let _ = taken.send(());
            self.process(&job).await;
        }
        log::debug!("Catalog worker of {} exiting", self.namespace);
    }

    async fn process(&self, job: &CheckJob) {
        for attempt in 1..=MAX_RETRY_ON_FAILED {
            match self.check(job).await {
                Ok(outcome) => {
                    log::debug!("Check of {} completed - {outcome:?}", job.name);
                    return;
                }
                Err(err) => log::warn!("Check of {} failed (attempt {attempt}/{MAX_RETRY_ON_FAILED}) - {err}", job.name),
            }
        }
        metrics::counter!(RESOLVE_FAILURES_METRIC_NAME, "source" => job.source.clone()).increment(1);
        log::error!("Dropping check of {} after {MAX_RETRY_ON_FAILED} failed attempts", job.name);
    }

    async fn check(&self, job: &CheckJob) -> Result<ReconcileOutcome, ControllerError> {
        let resolver = self.registry.dispatch(&job.source)
            .ok_or_else(|| ControllerError::UnknownSource(job.source.clone()))?;
        let version = resolver.resolve(&job.image.repository, &job.name, job.image.pattern_or_empty()).await?;
        let outcome = self.reconciler.reconcile(&self.namespace, &job.name, &version, &job.image.repository).await?;
        Ok(outcome)
    }
}
