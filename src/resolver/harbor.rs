use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::core::config::ResolverConfig;
use crate::core::error::ResolverError;
use crate::resolver::{compile_pattern, fetch_json, race_deadline, ImageReference, VersionResolver};
use crate::resolver::version::latest;

pub const HARBOR_RESOLVER_NAME: &str = "harbor";

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Internal registry resolver: collects every matching tag and picks the greatest one.
#[derive(Clone)]
pub struct HarborResolver {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
    page_size: usize,
    deadline: Duration,
    page_timeout: Duration,
}

impl HarborResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let harbor = &config.harbor;
        let base_url = harbor.url.clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ResolverError::Configuration(String::from("harbor url is not configured")))?;
        let credentials = match (&harbor.username, &harbor.password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            (None, None) => None,
            _ => return Err(ResolverError::Configuration(String::from("harbor credentials are incomplete"))),
        };
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| ResolverError::Configuration(format!("cannot build http client - {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            page_size: harbor.page_size,
            deadline: config.deadline(),
            page_timeout: config.page_timeout(),
        })
    }

    async fn list_tags(&self, cancel: CancellationToken, path: &str) -> Result<Vec<String>, ResolverError> {
        let mut tags = Vec::new();
        let mut next = Some(format!("{}/v2/{path}/tags/list?n={}", self.base_url, self.page_size));

        while let Some(url) = next {
            log::debug!("Fetching harbor tags page {url}");
            let mut request = self.client.get(&url).timeout(self.page_timeout);
            if let Some((username, password)) = &self.credentials {
                request = request.basic_auth(username, Some(password));
            }
            let (page, headers) = fetch_json::<TagList>(&cancel, request, &format!("harbor tags of {path}")).await?;
            tags.extend(page.tags.unwrap_or_default());
            next = next_page(&headers).map(|link| self.absolute(&link));
        }

        Ok(tags)
    }

    fn absolute(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            String::from(link)
        } else {
            format!("{}/{}", self.base_url, link.trim_start_matches('/'))
        }
    }

    async fn walk(&self, cancel: CancellationToken, path: String, re: Regex) -> Result<String, ResolverError> {
        let tags = self.list_tags(cancel, &path).await?;
        let matching = tags.iter()
            .map(String::as_str)
            .filter(|tag| re.is_match(tag));

        latest(matching)
            .map(String::from)
            .ok_or_else(|| ResolverError::ImageVersionNotFound(format!("no pattern match for {path} with '{re}' among {} tags", tags.len())))
    }
}

fn next_page(headers: &HeaderMap) -> Option<String> {
    lazy_static! {
        static ref NEXT_LINK: Regex = Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).unwrap();
    }
    headers.get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| NEXT_LINK.captures(value).map(|caps| caps[1].to_string()))
}

#[async_trait]
impl VersionResolver for HarborResolver {
    fn name(&self) -> &str {
        HARBOR_RESOLVER_NAME
    }

    async fn resolve(&self, repository: &str, name: &str, pattern: &str) -> Result<String, ResolverError> {
        let reference = ImageReference::parse(repository)?;
        let re = compile_pattern(pattern)?;
        log::debug!("Resolving {name} from harbor repository {}", reference.path);

        let walker = self.clone();
        race_deadline(self.deadline, move |cancel| async move {
            walker.walk(cancel, reference.path, re).await
        }).await
    }
}
