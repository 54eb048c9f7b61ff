use std::sync::Arc;

use chrono::Utc;

use crate::core::error::StoreError;
use crate::model::desired::{DesiredStateRecord, RecordKey};
use crate::store::DesiredStateStore;

/// Action taken upon a desired state record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record did not exist and was created
    Created,
    /// Version or repository changed
    Updated { previous_version: String },
    /// The record is already in desired state
    Unchanged,
}

/// Publishes fresh resolutions into the desired state store, touching a record only when the
/// resolution differs from what is stored.
#[derive(Clone)]
pub struct DesiredStateReconciler {
    store: Arc<dyn DesiredStateStore>,
}

impl DesiredStateReconciler {
    pub fn new(store: Arc<dyn DesiredStateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DesiredStateStore> {
        &self.store
    }

    pub async fn reconcile(&self, namespace: &str, name: &str, version: &str, repository: &str) -> Result<ReconcileOutcome, StoreError> {
        let key = RecordKey::new(namespace, name);
        let now = Utc::now();

        let Some(current) = self.store.get(&key).await? else {
            log::info!("Creating desired state {namespace}/{name} with {repository}:{version}");
            self.store.create(&DesiredStateRecord::new(&key, repository, version, now)).await?;
            return Ok(ReconcileOutcome::Created);
        };

        if current.matches(repository, version) {
            log::debug!("Desired state {namespace}/{name} already at {repository}:{version}");
            return Ok(ReconcileOutcome::Unchanged);
        }

        log::info!("Updating desired state {namespace}/{name} from {}:{} to {repository}:{version}", current.repository, current.version);
        let previous_version = current.version.clone();
        let updated = DesiredStateRecord {
            repository: String::from(repository),
            version: String::from(version),
            updated_at: now.max(current.created_at),
            ..current
        };
        self.store.update(&updated).await?;
        Ok(ReconcileOutcome::Updated { previous_version })
    }
}

#[cfg(test)]
mod tests {
    use crate::store::memory::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = MemoryStore::new();
        let reconciler = DesiredStateReconciler::new(Arc::new(store.clone()));

        let first = reconciler.reconcile("team-a", "api", "1.0.0", "harbor.local/a/api").await.unwrap();
        let second = reconciler.reconcile("team-a", "api", "1.0.0", "harbor.local/a/api").await.unwrap();

        assert_eq!(first, ReconcileOutcome::Created);
        assert_eq!(second, ReconcileOutcome::Unchanged);
        assert_eq!(store.creates(), 1);
        assert_eq!(store.updates(), 0);

        let record = store.list().pop().expect("record not created");
        assert_eq!(record.created_at, record.updated_at);
    }

    #[tokio::test]
    async fn test_reconcile_updates_on_change() {
        let store = MemoryStore::new();
        let reconciler = DesiredStateReconciler::new(Arc::new(store.clone()));

        reconciler.reconcile("team-a", "api", "1.0.0", "harbor.local/a/api").await.unwrap();
        let created = store.list().pop().unwrap();
        let outcome = reconciler.reconcile("team-a", "api", "1.1.0", "harbor.local/a/api").await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Updated { previous_version: String::from("1.0.0") });
        let updated = store.list().pop().unwrap();
        assert_eq!(updated.version, "1.1.0");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= updated.created_at);
        assert_eq!(store.updates(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_surfaces_concurrent_delete() {
        struct VanishingStore(MemoryStore);

        #[async_trait::async_trait]
        impl DesiredStateStore for VanishingStore {
            async fn get(&self, key: &RecordKey) -> Result<Option<DesiredStateRecord>, StoreError> {
                let record = self.0.get(key).await?;
                self.0.remove(key);
                Ok(record)
            }

            async fn create(&self, record: &DesiredStateRecord) -> Result<(), StoreError> {
                self.0.create(record).await
            }

            async fn update(&self, record: &DesiredStateRecord) -> Result<(), StoreError> {
                self.0.update(record).await
            }
        }

        let inner = MemoryStore::new();
        inner.create(&DesiredStateRecord::new(&RecordKey::new("team-a", "api"), "repo", "1.0.0", Utc::now())).await.unwrap();
        let reconciler = DesiredStateReconciler::new(Arc::new(VanishingStore(inner)));

        let out = reconciler.reconcile("team-a", "api", "2.0.0", "repo").await;
        assert!(matches!(out, Err(StoreError::NotFound { .. })));
    }
}
