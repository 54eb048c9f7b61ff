use async_trait::async_trait;
use kube::{Api, Client, ResourceExt};
use kube::api::PostParams;

use crate::core::error::StoreError;
use crate::model::desired::{DesiredStateRecord, RecordKey};
use crate::model::spec::{resource_name, DesiredVersion, DesiredVersionSpec};
use crate::store::DesiredStateStore;

/// Records persisted as `DesiredVersion` custom resources, one per component and namespace.
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn try_default() -> Result<Self, StoreError> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn versions(&self, namespace: &str) -> Api<DesiredVersion> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn to_resource(record: &DesiredStateRecord) -> Result<DesiredVersion, StoreError> {
        let mut resource = DesiredVersion::new(&object_name(&record.name)?, DesiredVersionSpec::from(record));
        resource.metadata.namespace = Some(record.namespace.clone());
        resource.metadata.resource_version = record.revision.clone();
        Ok(resource)
    }
}

fn object_name(component: &str) -> Result<String, StoreError> {
    resource_name(component).ok_or_else(|| StoreError::InvalidName(String::from(component)))
}

/// Record held by `resource`, refused when the object belongs to another component whose name
/// sanitizes to the same object name.
fn to_record(key: &RecordKey, resource: DesiredVersion) -> Result<DesiredStateRecord, StoreError> {
    if resource.spec.component.ne(&key.name) {
        return Err(StoreError::NameClash {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            owner: resource.spec.component.clone(),
        });
    }
    Ok(DesiredStateRecord {
        namespace: resource.namespace().unwrap_or_else(|| key.namespace.clone()),
        revision: resource.resource_version(),
        name: resource.spec.component,
        repository: resource.spec.repository,
        version: resource.spec.version,
        created_at: resource.spec.created_at,
        updated_at: resource.spec.updated_at,
    })
}

fn api_error_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

#[async_trait]
impl DesiredStateStore for KubeStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<DesiredStateRecord>, StoreError> {
        let resource = self.versions(&key.namespace)
            .get_opt(&object_name(&key.name)?)
            .await?;

        resource.map(|resource| to_record(key, resource)).transpose()
    }

    async fn create(&self, record: &DesiredStateRecord) -> Result<(), StoreError> {
        let resource = Self::to_resource(&DesiredStateRecord { revision: None, ..record.clone() })?;
        match self.versions(&record.namespace).create(&PostParams::default(), &resource).await {
            Ok(_) => Ok(()),
            Err(err) if api_error_code(&err) == Some(409) => {
                self.get(&RecordKey::new(&record.namespace, &record.name)).await?;
                log::debug!("DesiredVersion {}/{} already exists", record.namespace, record.name);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update(&self, record: &DesiredStateRecord) -> Result<(), StoreError> {
        let resource = Self::to_resource(record)?;
        let name = resource.name_any();
        match self.versions(&record.namespace).replace(&name, &PostParams::default(), &resource).await {
            Ok(_) => Ok(()),
            Err(err) => match api_error_code(&err) {
                Some(404) => Err(StoreError::NotFound { namespace: record.namespace.clone(), name: record.name.clone() }),
                Some(409) => Err(StoreError::Conflict { namespace: record.namespace.clone(), name: record.name.clone() }),
                _ => Err(err.into()),
            },
        }
    }
}
