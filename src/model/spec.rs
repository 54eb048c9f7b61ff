use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::desired::DesiredStateRecord;

/// Desired version of a fleet component, published for the deployment tooling
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[kube(group = "tagwatch.d71.dev", version = "v1", kind = "DesiredVersion", namespaced)]
#[kube(printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#)]
#[serde(rename_all = "camelCase")]
pub struct DesiredVersionSpec {
    pub component: String,
    pub repository: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&DesiredStateRecord> for DesiredVersionSpec {
    fn from(value: &DesiredStateRecord) -> Self {
        Self {
            component: value.name.clone(),
            repository: value.repository.clone(),
            version: value.version.clone(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

const MAX_RESOURCE_NAME_LEN: usize = 253;

/// Object names must be valid DNS subdomains while component names are free-form.
///
/// `None` when nothing usable is left after sanitizing. Distinct components may map to the same
/// name, so readers must compare `spec.component` against the component they asked for.
pub fn resource_name(component: &str) -> Option<String> {
    let sanitized = component
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect::<String>();
    let trimmed = sanitized.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() || trimmed.len() > MAX_RESOURCE_NAME_LEN {
        return None;
    }
    Some(String::from(trimmed))
}
