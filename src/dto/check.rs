use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::desired::DesiredStateRecord;
use crate::model::timeline::TimelineEntry;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckAcceptedDto {
    pub status: CheckStatus,
    pub enqueued: usize,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Accepted,
    Ignored,
}

impl CheckAcceptedDto {
    pub fn from_enqueued(enqueued: usize) -> Self {
        Self {
            status: if enqueued > 0 { CheckStatus::Accepted } else { CheckStatus::Ignored },
            enqueued,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentChangedReqDto {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DesiredStateDto {
    pub namespace: String,
    pub name: String,
    pub repository: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DesiredStateRecord> for DesiredStateDto {
    fn from(record: DesiredStateRecord) -> Self {
        Self {
            namespace: record.namespace,
            name: record.name,
            repository: record.repository,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDto {
    pub team: String,
    pub component: String,
    pub entries: Vec<TimelineEntry>,
}
