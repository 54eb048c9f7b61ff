use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use tagwatch::core::config::FleetConfig;
use tagwatch::core::error::{ControllerError, StoreError};
use tagwatch::model::component::{Component, Image};
use tagwatch::model::desired::{DesiredStateRecord, RecordKey};
use tagwatch::resolver::registry::ResolverRegistry;
use tagwatch::service::fleet_loop::{ActiveImages, FleetLoop, NoActiveImages, RateLimitedEvent};
use tagwatch::service::reconciler_svc::DesiredStateReconciler;
use tagwatch::service::reporter::{MissingImage, Reporter};
use tagwatch::store::DesiredStateStore;
use tagwatch::store::memory::MemoryStore;

use crate::common::{component, eventually, Scripted, ScriptedResolver};

mod common;

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<MissingImage>>,
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn report_missing_image(&self, event: &MissingImage) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RejectingStore {
    reads: AtomicUsize,
}

#[async_trait]
impl DesiredStateStore for RejectingStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<DesiredStateRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::InvalidName(key.name.clone()))
    }

    async fn create(&self, record: &DesiredStateRecord) -> Result<(), StoreError> {
        Err(StoreError::InvalidName(record.name.clone()))
    }

    async fn update(&self, record: &DesiredStateRecord) -> Result<(), StoreError> {
        Err(StoreError::InvalidName(record.name.clone()))
    }
}

struct PinnedImage(&'static str);

impl ActiveImages for PinnedImage {
    fn active_image(&self, _team: &str, _component: &str) -> Option<String> {
        Some(String::from(self.0))
    }
}

struct Fixture {
    fleet: FleetLoop,
    resolver: Arc<ScriptedResolver>,
    reporter: Arc<RecordingReporter>,
    store: MemoryStore,
}

fn fixture(resolver: ScriptedResolver, active: Arc<dyn ActiveImages>) -> Fixture {
    fixture_with(FleetConfig::default(), resolver, active)
}

fn fixture_with(config: FleetConfig, resolver: ScriptedResolver, active: Arc<dyn ActiveImages>) -> Fixture {
    let resolver = Arc::new(resolver);
    let registry = ResolverRegistry::new();
    registry.register(resolver.clone());
    let reporter = Arc::new(RecordingReporter::default());
    let store = MemoryStore::new();

    let fleet = FleetLoop::new(
        config,
        registry,
        DesiredStateReconciler::new(Arc::new(store.clone())),
        vec![reporter.clone() as Arc<dyn Reporter>],
        active,
    );
    Fixture { fleet, resolver, reporter, store }
}

fn update_ledger() -> RateLimitedEvent {
    RateLimitedEvent::UpdateDesired {
        team: String::from("payments"),
        component: String::from("ledger"),
        source: String::from("harbor"),
        image: Image::new("harbor.local/team/ledger", None),
    }
}

#[tokio::test]
async fn component_change_fans_out_to_teams() {
    let fx = fixture(ScriptedResolver::new("harbor"), Arc::new(NoActiveImages));
    let mut forked = component("ledger", "harbor");
    forked.image = Image::new("harbor.local/risk/ledger", None);

    fx.fleet.set_team_catalog("payments", &[component("ledger", "harbor"), component("gateway", "harbor")]).await;
    fx.fleet.set_team_catalog("risk", &[forked, component("scoring", "unregistered")]).await;
    assert_eq!(fx.fleet.teams_count().await, 2);

    fx.fleet.handle(&RateLimitedEvent::ComponentChanged { name: String::from("ledger"), repository: None }).await.unwrap();
    assert_eq!(fx.fleet.pending(), 2);
}

#[tokio::test]
async fn component_change_filters_by_repository() {
    let fx = fixture(ScriptedResolver::new("harbor"), Arc::new(NoActiveImages));
    let mut forked = component("ledger", "harbor");
    forked.image = Image::new("harbor.local/risk/ledger", None);
    fx.fleet.set_team_catalog("payments", &[component("ledger", "harbor")]).await;
    fx.fleet.set_team_catalog("risk", &[forked]).await;

    fx.fleet.handle(&RateLimitedEvent::ComponentChanged {
        name: String::from("ledger"),
        repository: Some(String::from("harbor.local/risk/ledger")),
    }).await.unwrap();
    assert_eq!(fx.fleet.pending(), 1);

    fx.fleet.handle(&RateLimitedEvent::ComponentChanged { name: String::from("scoring"), repository: None }).await.unwrap();
    assert_eq!(fx.fleet.pending(), 1);
}

#[tokio::test]
async fn missing_image_is_reported_without_touching_record() {
    let fx = fixture(ScriptedResolver::new("harbor").answer("ledger", Scripted::NotFound), Arc::new(NoActiveImages));

    fx.fleet.handle(&update_ledger()).await.unwrap();

    let timeline = fx.fleet.timeline("payments", "ledger").expect("miss not recorded");
    let entry = timeline.get("harbor.local/team/ledger").expect("miss entry missing");
    assert!(!entry.resolved);

    let events = fx.reporter.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].team, "payments");
    assert_eq!(events[0].component, "ledger");
    assert!(fx.store.list().is_empty());
}

#[tokio::test]
async fn timeout_is_soft() {
    let fx = fixture(ScriptedResolver::new("harbor").answer("ledger", Scripted::Timeout), Arc::new(NoActiveImages));

    assert!(fx.fleet.handle(&update_ledger()).await.is_ok());
    assert_eq!(fx.reporter.events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn hard_error_propagates() {
    let fx = fixture(ScriptedResolver::new("harbor").answer("ledger", Scripted::Broken), Arc::new(NoActiveImages));

    let out = fx.fleet.handle(&update_ledger()).await;
    assert!(matches!(out, Err(ControllerError::Resolver(_))), "unexpected outcome {out:?}");
    assert!(fx.reporter.events.lock().unwrap().is_empty());
    assert!(fx.fleet.timeline("payments", "ledger").is_none());
}

#[tokio::test]
async fn unknown_source_is_error() {
    let fx = fixture(ScriptedResolver::new("harbor"), Arc::new(NoActiveImages));
    let event = RateLimitedEvent::UpdateDesired {
        team: String::from("payments"),
        component: String::from("ledger"),
        source: String::from("quay"),
        image: Image::new("quay.io/team/ledger", None),
    };
    assert!(matches!(fx.fleet.handle(&event).await, Err(ControllerError::UnknownSource(_))));
}

#[tokio::test]
async fn success_records_and_reconciles() {
    let fx = fixture(ScriptedResolver::new("harbor").answer("ledger", Scripted::Version("1.0.270")), Arc::new(NoActiveImages));

    fx.fleet.handle(&update_ledger()).await.unwrap();
    fx.fleet.handle(&update_ledger()).await.unwrap();

    let record = fx.store.get(&RecordKey::new("payments", "ledger")).await.unwrap().expect("record not created");
    assert_eq!(record.version, "1.0.270");
    assert_eq!(record.repository, "harbor.local/team/ledger");
    assert_eq!(fx.store.creates(), 1);
    assert_eq!(fx.store.updates(), 0);

    let timeline = fx.fleet.timeline("payments", "ledger").unwrap();
    assert_eq!(timeline.len(), 1);
    assert!(timeline.get("harbor.local/team/ledger:1.0.270").unwrap().resolved);
}

async fn resolve_twelve_versions(fx: &Fixture) {
    const VERSIONS: [&str; 12] = [
        "1.0.0", "1.0.1", "1.0.2", "1.0.3", "1.0.4", "1.0.5",
        "1.0.6", "1.0.7", "1.0.8", "1.0.9", "1.0.10", "1.0.11",
    ];
    for version in VERSIONS {
        fx.resolver.set("ledger", Scripted::Version(version));
        fx.fleet.handle(&update_ledger()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn timeline_is_pruned_to_retention() {
    let fx = fixture(ScriptedResolver::new("harbor"), Arc::new(NoActiveImages));

    resolve_twelve_versions(&fx).await;

    let timeline = fx.fleet.timeline("payments", "ledger").unwrap();
    assert_eq!(timeline.len(), 10);
    assert!(timeline.get("harbor.local/team/ledger:1.0.0").is_none());
    assert!(timeline.get("harbor.local/team/ledger:1.0.1").is_none());
    assert!(timeline.get("harbor.local/team/ledger:1.0.11").is_some());
    assert_eq!(fx.store.updates(), 11);
}

#[tokio::test]
async fn miss_on_full_timeline_stays_within_retention() {
    let fx = fixture(ScriptedResolver::new("harbor"), Arc::new(NoActiveImages));
    resolve_twelve_versions(&fx).await;
    assert_eq!(fx.fleet.timeline("payments", "ledger").unwrap().len(), 10);

    fx.resolver.set("ledger", Scripted::NotFound);
    fx.fleet.handle(&update_ledger()).await.unwrap();

    let timeline = fx.fleet.timeline("payments", "ledger").unwrap();
    assert_eq!(timeline.len(), 10);
    assert!(!timeline.get("harbor.local/team/ledger").expect("miss entry missing").resolved);
    assert!(timeline.get("harbor.local/team/ledger:1.0.2").is_none());
    assert!(timeline.get("harbor.local/team/ledger:1.0.11").is_some());
}

#[tokio::test]
async fn timeline_keeps_active_image() {
    let fx = fixture(ScriptedResolver::new("harbor"), Arc::new(PinnedImage("harbor.local/team/ledger:1.0.0")));

    resolve_twelve_versions(&fx).await;

    let timeline = fx.fleet.timeline("payments", "ledger").unwrap();
    assert!(timeline.get("harbor.local/team/ledger:1.0.0").is_some());
    assert!(timeline.get("harbor.local/team/ledger:1.0.1").is_none());
    assert_eq!(timeline.len(), 11);
}

#[tokio::test]
async fn failed_event_is_retried_with_backoff() {
    let fx = fixture(ScriptedResolver::new("harbor").answer("ledger", Scripted::Broken), Arc::new(NoActiveImages));
    fx.fleet.start();
    fx.fleet.enqueue(update_ledger());

    let resolver = fx.resolver.clone();
    assert!(eventually(Duration::from_secs(2), || {
        let resolver = resolver.clone();
        async move { resolver.calls("ledger") >= 3 }
    }).await, "failed event was not requeued");

    fx.resolver.set("ledger", Scripted::Version("2.0.0"));
    let store = fx.store.clone();
    assert!(eventually(Duration::from_secs(5), || {
        let store = store.clone();
        async move { !store.list().is_empty() }
    }).await, "event never succeeded after recovery");

    fx.fleet.shutdown();
}

#[tokio::test]
async fn health_tick_rearms_and_metric_tick_does_not() {
    let config = FleetConfig { health_interval_secs: 1, ..FleetConfig::default() };
    let fx = fixture_with(config, ScriptedResolver::new("harbor"), Arc::new(NoActiveImages));
    fx.fleet.set_team_catalog("payments", &Vec::<Component>::new()).await;

    fx.fleet.handle(&RateLimitedEvent::MetricTick).await.unwrap();
    fx.fleet.handle(&RateLimitedEvent::HealthTick).await.unwrap();
    assert_eq!(fx.fleet.pending(), 0, "health tick re-armed before its interval");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(fx.fleet.pending(), 0);

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(fx.fleet.pending(), 1, "only the health tick comes back");

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(fx.fleet.pending(), 1, "metric tick was re-armed");
}

#[tokio::test]
async fn unusable_record_name_is_not_retried() {
    let store = Arc::new(RejectingStore::default());
    let resolver = Arc::new(ScriptedResolver::new("harbor").answer("ledger", Scripted::Version("1.0.0")));
    let registry = ResolverRegistry::new();
    registry.register(resolver.clone());
    let fleet = FleetLoop::new(
        FleetConfig::default(),
        registry,
        DesiredStateReconciler::new(store.clone()),
        vec![],
        Arc::new(NoActiveImages),
    );
    fleet.start();
    fleet.enqueue(update_ledger());

    let counted = resolver.clone();
    assert!(eventually(Duration::from_secs(2), || {
        let resolver = counted.clone();
        async move { resolver.calls("ledger") >= 1 }
    }).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(resolver.calls("ledger"), 1, "permanent failure was requeued");
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);

    fleet.shutdown();
}
