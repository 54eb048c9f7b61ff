//! Strategies discovering the newest acceptable version of a component from one upstream source.
//!
//! Every resolver runs its network walk in a dedicated task raced against an overall deadline.
//! When the deadline wins the caller gets [`ResolverError::RequestTimeout`] right away and the
//! walk observes the cancellation before issuing its next request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::core::error::ResolverError;

pub mod daily;
pub mod fleet;
pub mod harbor;
pub mod hub;
pub mod registry;
pub mod version;

#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Stable identifier, unique inside a registry.
    fn name(&self) -> &str;

    /// Resolves the version of component `name` published under `repository`.
    ///
    /// An empty `pattern` matches every tag unless the resolver synthesizes its own default.
    async fn resolve(&self, repository: &str, name: &str, pattern: &str) -> Result<String, ResolverError>;
}

pub fn compile_pattern(pattern: &str) -> Result<Regex, ResolverError> {
    let pattern = if pattern.is_empty() { ".*" } else { pattern };
    Regex::new(pattern)
        .map_err(|err| ResolverError::InvalidArgument(format!("invalid pattern '{pattern}' - {err}")))
}

/// Registry-qualified image reference split into domain and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub domain: String,
    pub path: String,
}

pub const DEFAULT_DOMAIN: &str = "docker.io";

impl ImageReference {
    /// References without an explicit registry domain default to Docker Hub.
    pub fn parse(repository: &str) -> Result<Self, ResolverError> {
        let repository = repository.trim().trim_end_matches('/');
        if repository.is_empty() {
            return Err(ResolverError::InvalidArgument(String::from("empty repository reference")));
        }
        let (domain, path) = match repository.split_once('/') {
            Some((first, rest)) if first.contains('.') || first.contains(':') || first.eq("localhost") => (first, rest),
            _ => (DEFAULT_DOMAIN, repository),
        };
        if path.is_empty() || path.split('/').any(str::is_empty) {
            return Err(ResolverError::InvalidArgument(format!("malformed repository reference '{repository}'")));
        }
        Ok(Self {
            domain: domain.to_ascii_lowercase(),
            path: String::from(path),
        })
    }
}

/// Runs `walk` in its own task and races it against `deadline`.
pub async fn race_deadline<F, Fut>(deadline: Duration, walk: F) -> Result<String, ResolverError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output=Result<String, ResolverError>> + Send + 'static,
{
    let token = CancellationToken::new();
    // cancels the walk on every exit path, including the caller being dropped
    let _guard = token.clone().drop_guard();
    let mut handle = tokio::spawn(walk(token.clone()));

    tokio::select! {
        joined = &mut handle => joined
            .map_err(|err| ResolverError::Aborted(err.to_string()))?,
        _ = tokio::time::sleep(deadline) => {
            log::debug!("Resolution deadline of {}ms reached, cancelling walk", deadline.as_millis());
            Err(ResolverError::RequestTimeout { millis: deadline.as_millis() })
        }
    }
}

/// Fetches and decodes one JSON document unless the walk was cancelled.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    cancel: &CancellationToken,
    request: reqwest::RequestBuilder,
    context: &str,
) -> Result<(T, HeaderMap), ResolverError> {
    if cancel.is_cancelled() {
        return Err(ResolverError::Aborted(format!("{context} cancelled")));
    }
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(ResolverError::Aborted(format!("{context} cancelled"))),
        response = request.send() => response.map_err(|err| ResolverError::transport(context, err))?,
    };
    let status = response.status();
    if !status.is_success() {
        return Err(ResolverError::Status { url: response.url().to_string(), status: status.as_u16() });
    }
    let headers = response.headers().clone();
    let body = response.bytes().await
        .map_err(|err| ResolverError::transport(context, err))?;
    let decoded = serde_json::from_slice(&body)
        .map_err(|err| ResolverError::decode(context, err))?;
    Ok((decoded, headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            ImageReference::parse("harbor.local/infra/gateway").unwrap(),
            ImageReference { domain: String::from("harbor.local"), path: String::from("infra/gateway") },
        );
        assert_eq!(
            ImageReference::parse("bitnami/redis").unwrap(),
            ImageReference { domain: String::from("docker.io"), path: String::from("bitnami/redis") },
        );
        assert_eq!(
            ImageReference::parse("localhost:5000/api").unwrap().domain,
            "localhost:5000",
        );
        assert!(matches!(ImageReference::parse(""), Err(ResolverError::InvalidArgument(_))));
        assert!(matches!(ImageReference::parse("quay.io//x"), Err(ResolverError::InvalidArgument(_))));
    }

    #[test]
    fn test_compile_pattern() {
        assert!(compile_pattern("").unwrap().is_match("anything"));
        assert!(matches!(compile_pattern("1.(("), Err(ResolverError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_race_returns_walk_result() {
        let out = race_deadline(Duration::from_secs(1), |_| async { Ok(String::from("1.0.0")) }).await;
        assert_eq!(out.unwrap(), "1.0.0");
    }

    #[tokio::test]
    async fn test_race_times_out_and_cancels() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let started = tokio::time::Instant::now();
        let out = race_deadline(Duration::from_millis(50), |cancel| async move {
            cancel.cancelled().await;
            let _ = tx.send(());
            Ok(String::from("never"))
        }).await;

        assert!(matches!(out, Err(ResolverError::RequestTimeout { millis: 50 })));
        assert!(started.elapsed() < Duration::from_secs(1));
        tokio::time::timeout(Duration::from_secs(1), rx).await
            .expect("walk did not observe cancellation")
            .expect("walk dropped its sender");
    }
}
