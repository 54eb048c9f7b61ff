use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub namespace: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: String::from(namespace),
            name: String::from(name),
        }
    }
}

/// Persisted outcome of a resolution, consumed by the deployment tooling.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DesiredStateRecord {
    pub namespace: String,
    pub name: String,
    pub repository: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Opaque store revision used for optimistic concurrency on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl DesiredStateRecord {
    pub fn new(key: &RecordKey, repository: &str, version: &str, now: DateTime<Utc>) -> Self {
        Self {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            repository: String::from(repository),
            version: String::from(version),
            created_at: now,
            updated_at: now,
            revision: None,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.namespace, &self.name)
    }

    pub fn matches(&self, repository: &str, version: &str) -> bool {
        self.repository.eq(repository) && self.version.eq(version)
    }
}
