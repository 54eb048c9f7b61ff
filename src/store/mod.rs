use async_trait::async_trait;

use crate::core::error::StoreError;
use crate::model::desired::{DesiredStateRecord, RecordKey};

pub mod kube_store;
pub mod memory;

/// Declarative store holding the desired state records.
#[async_trait]
pub trait DesiredStateStore: Send + Sync {
    async fn get(&self, key: &RecordKey) -> Result<Option<DesiredStateRecord>, StoreError>;

    /// Creating a record that already exists is not an error.
    async fn create(&self, record: &DesiredStateRecord) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] when the record disappeared since it was read.
    async fn update(&self, record: &DesiredStateRecord) -> Result<(), StoreError>;
}
