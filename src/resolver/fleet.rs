use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::core::config::ResolverConfig;
use crate::core::error::ResolverError;
use crate::resolver::{fetch_json, race_deadline, VersionResolver};
use crate::resolver::version::latest;

pub const FLEET_RESOLVER_NAME: &str = "fleet";

#[derive(Deserialize)]
struct InventoryEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize, Debug)]
pub struct InstanceRecord {
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub dc: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub version: String,
}

/// Resolves the version already running on the majority of the fleet instances.
#[derive(Clone)]
pub struct FleetResolver {
    client: reqwest::Client,
    url: String,
    token: String,
    service: String,
    dc: String,
    role: String,
    app_ids: HashMap<String, String>,
    deadline: Duration,
    page_timeout: Duration,
}

impl FleetResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let fleet = &config.fleet;
        let required = |value: &Option<String>, key: &str| value.clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ResolverError::Configuration(format!("fleet inventory {key} is not configured")));

        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| ResolverError::Configuration(format!("cannot build http client - {err}")))?;

        Ok(Self {
            client,
            url: required(&fleet.url, "url")?,
            token: required(&fleet.token, "token")?,
            service: required(&fleet.service, "service")?,
            dc: fleet.dc.clone().unwrap_or_default(),
            role: fleet.role.clone().unwrap_or_default(),
            app_ids: fleet.app_ids.clone(),
            deadline: config.deadline(),
            page_timeout: config.page_timeout(),
        })
    }

    async fn fetch_instances(&self, cancel: CancellationToken, app_id: String) -> Result<Vec<InstanceRecord>, ResolverError> {
        let request = self.client.get(&self.url)
            .bearer_auth(&self.token)
            .query(&[("app", &app_id), ("service", &self.service), ("dc", &self.dc), ("role", &self.role)])
            .timeout(self.page_timeout);

        let context = format!("fleet inventory of {app_id}");
        let (envelope, _) = fetch_json::<InventoryEnvelope>(&cancel, request, &context).await?;
        if envelope.code != 0 {
            return Err(ResolverError::Upstream(format!("{context} answered code {} - {}", envelope.code, envelope.message)));
        }
        let instances = serde_json::from_str::<Vec<InstanceRecord>>(&envelope.data)
            .map_err(|err| ResolverError::decode(format!("{context} payload"), err))?;

        Ok(instances.into_iter()
            .filter(|instance| instance.app.is_empty() || instance.app.eq(&app_id))
            .collect())
    }
}

/// Normalized version token (`1_0-3` becomes `1.0.3`) embedded in an instance tag.
pub fn version_token(tag: &str) -> Option<String> {
    lazy_static! {
        static ref VERSION_TOKEN: Regex = Regex::new(r"\d+(?:[._-]\d+)+").unwrap();
    }
    VERSION_TOKEN.find(tag)
        .map(|found| found.as_str().replace(['_', '-'], "."))
}

/// Most frequent version token; ties at the top count go to the greatest version.
pub fn majority_version<'a, I>(tags: I) -> Option<String>
    where I: IntoIterator<Item=&'a str>,
{
    let counts = tags.into_iter()
        .filter_map(version_token)
        .fold(HashMap::<String, usize>::new(), |mut acc, token| {
            *acc.entry(token).or_default() += 1;
            acc
        });

    let max_count = counts.values().copied().max()?;
    let leaders = counts.iter()
        .filter(|(_, count)| **count == max_count)
        .map(|(token, _)| token.as_str());
    latest(leaders).map(String::from)
}

#[async_trait]
impl VersionResolver for FleetResolver {
    fn name(&self) -> &str {
        FLEET_RESOLVER_NAME
    }

    async fn resolve(&self, _repository: &str, name: &str, _pattern: &str) -> Result<String, ResolverError> {
        let app_id = self.app_ids.get(name)
            .cloned()
            .ok_or_else(|| ResolverError::AppNameNotFound(String::from(name)))?;

        let walker = self.clone();
        let component = String::from(name);
        race_deadline(self.deadline, move |cancel| async move {
            let instances = walker.fetch_instances(cancel, app_id).await?;
            log::debug!("Fleet inventory reported {} instances of {component}", instances.len());
            majority_version(instances.iter().map(|instance| instance.version.as_str()))
                .ok_or_else(|| ResolverError::NoDesiredComponentVersion(format!("no instance of {component} reports a version")))
        }).await
    }
}
