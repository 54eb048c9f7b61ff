use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::core::error::StoreError;
use crate::model::desired::{DesiredStateRecord, RecordKey};
use crate::store::DesiredStateStore;

/// Process local store, also counting the writes it receives.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<RecordKey, DesiredStateRecord>>,
    creates: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn remove(&self, key: &RecordKey) -> Option<DesiredStateRecord> {
        self.records.remove(key).map(|(_, record)| record)
    }

    pub fn list(&self) -> Vec<DesiredStateRecord> {
        let mut records = self.records.iter()
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        records.sort_by_key(|record| record.key());
        records
    }
}

#[async_trait]
impl DesiredStateStore for MemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<DesiredStateRecord>, StoreError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn create(&self, record: &DesiredStateRecord) -> Result<(), StoreError> {
        match self.records.entry(record.key()) {
            Entry::Occupied(entry) => {
                log::debug!("Record {}/{} already exists", entry.key().namespace, entry.key().name);
            }
            Entry::Vacant(entry) => {
                entry.insert(DesiredStateRecord { revision: Some(String::from("1")), ..record.clone() });
                self.creates.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    async fn update(&self, record: &DesiredStateRecord) -> Result<(), StoreError> {
        let key = record.key();
        let Some(mut current) = self.records.get_mut(&key) else {
            return Err(StoreError::NotFound { namespace: key.namespace, name: key.name });
        };
        if current.revision.ne(&record.revision) {
            return Err(StoreError::Conflict { namespace: key.namespace, name: key.name });
        }
        let revision = current.revision.as_deref()
            .and_then(|rev| rev.parse::<u64>().ok())
            .unwrap_or_default() + 1;
        *current = DesiredStateRecord { revision: Some(revision.to_string()), ..record.clone() };
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
