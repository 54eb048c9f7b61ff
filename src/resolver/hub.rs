use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::core::config::{HubConfig, ResolverConfig};
use crate::core::error::ResolverError;
use crate::resolver::{compile_pattern, fetch_json, race_deadline, ImageReference, VersionResolver};

pub const HUB_RESOLVER_NAME: &str = "hub";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubProvider {
    DockerHub,
    Quay,
}

impl HubProvider {
    pub fn for_domain(domain: &str) -> Option<Self> {
        match domain {
            "docker.io" | "index.docker.io" | "registry-1.docker.io" | "hub.docker.com" => Some(Self::DockerHub),
            "quay.io" => Some(Self::Quay),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct TagName {
    name: String,
}

#[derive(Deserialize)]
struct DockerHubPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<TagName>,
}

#[derive(Deserialize)]
struct QuayPage {
    #[serde(default)]
    tags: Vec<TagName>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    has_additional: bool,
}

/// Public registries walked page by page, returning the first tag matching the pattern in
/// listing order.
#[derive(Clone)]
pub struct HubResolver {
    client: reqwest::Client,
    config: HubConfig,
    deadline: Duration,
    page_timeout: Duration,
}

impl HubResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| ResolverError::Configuration(format!("cannot build http client - {err}")))?;
        Ok(Self {
            client,
            config: config.hub.clone(),
            deadline: config.deadline(),
            page_timeout: config.page_timeout(),
        })
    }

    async fn walk_docker_hub(&self, cancel: CancellationToken, path: String, re: Regex) -> Result<String, ResolverError> {
        let path = if path.contains('/') { path } else { format!("library/{path}") };
        let mut next = Some(format!(
            "{}/v2/repositories/{path}/tags?page_size={}",
            self.config.docker_hub_url.trim_end_matches('/'),
            self.config.page_size,
        ));

        while let Some(url) = next {
            log::debug!("Fetching docker hub tags page {url}");
            let request = self.client.get(&url).timeout(self.page_timeout);
            let (page, _) = fetch_json::<DockerHubPage>(&cancel, request, &format!("docker hub tags of {path}")).await?;
            if let Some(tag) = page.results.into_iter().find(|tag| re.is_match(&tag.name)) {
                return Ok(tag.name);
            }
            next = page.next.filter(|url| !url.is_empty());
        }

        Err(ResolverError::ImageVersionNotFound(format!("no pattern match for docker.io/{path} with '{re}'")))
    }

    async fn walk_quay(&self, cancel: CancellationToken, path: String, re: Regex) -> Result<String, ResolverError> {
        let mut page_idx = Some(1u32);

        while let Some(current) = page_idx {
            let url = format!(
                "{}/api/v1/repository/{path}/tag/",
                self.config.quay_url.trim_end_matches('/'),
            );
            log::debug!("Fetching quay tags page {current} of {path}");
            let request = self.client.get(&url)
                .query(&[("limit", self.config.page_size.to_string()), ("page", current.to_string()), ("onlyActiveTags", String::from("true"))])
                .timeout(self.page_timeout);
            let (page, _) = fetch_json::<QuayPage>(&cancel, request, &format!("quay tags of {path}")).await?;
            if let Some(tag) = page.tags.into_iter().find(|tag| re.is_match(&tag.name)) {
                return Ok(tag.name);
            }
            page_idx = if page.has_additional {
                Some(page.page.unwrap_or(current) + 1)
            } else {
                None
            };
        }

        Err(ResolverError::ImageVersionNotFound(format!("no pattern match for quay.io/{path} with '{re}'")))
    }
}

#[async_trait]
impl VersionResolver for HubResolver {
    fn name(&self) -> &str {
        HUB_RESOLVER_NAME
    }

    async fn resolve(&self, repository: &str, name: &str, pattern: &str) -> Result<String, ResolverError> {
        let reference = ImageReference::parse(repository)?;
        let provider = HubProvider::for_domain(&reference.domain)
            .ok_or_else(|| ResolverError::InvalidArgument(format!("unsupported registry domain '{}' for {name}", reference.domain)))?;
        let re = compile_pattern(pattern)?;

        let walker = self.clone();
        race_deadline(self.deadline, move |cancel| async move {
            match provider {
                HubProvider::DockerHub => walker.walk_docker_hub(cancel, reference.path, re).await,
                HubProvider::Quay => walker.walk_quay(cancel, reference.path, re).await,
            }
        }).await
    }
}
