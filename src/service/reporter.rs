use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::ReporterConfig;

/// A component whose version could not be resolved.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MissingImage {
    pub team: String,
    pub component: String,
    pub repository: String,
    pub source: String,
    pub reason: String,
    pub detected_at: DateTime<Utc>,
}

#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report_missing_image(&self, event: &MissingImage) -> anyhow::Result<()>;
}

pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    async fn report_missing_image(&self, event: &MissingImage) -> anyhow::Result<()> {
        log::warn!(
            "Missing image for {}/{} ({} via {}) - {}",
            event.team, event.component, event.repository, event.source, event.reason,
        );
        Ok(())
    }
}

/// Posts every missing image event as JSON to a fixed endpoint.
pub struct RestReporter {
    client: reqwest::Client,
    url: String,
}

impl RestReporter {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: String::from(url),
        }
    }
}

#[async_trait]
impl Reporter for RestReporter {
    async fn report_missing_image(&self, event: &MissingImage) -> anyhow::Result<()> {
        self.client.post(&self.url)
            .timeout(Duration::from_secs(10))
            .json(event)
            .send()
            .await
            .with_context(|| format!("Error posting missing image to {}", self.url))?
            .error_for_status()
            .context("Missing image endpoint rejected the event")?;
        Ok(())
    }
}

pub fn build_reporters(configs: &[ReporterConfig]) -> Vec<Arc<dyn Reporter>> {
    configs.iter()
        .map(|cfg| match cfg {
            ReporterConfig::Log => Arc::new(LogReporter) as Arc<dyn Reporter>,
            ReporterConfig::Rest { url } => Arc::new(RestReporter::new(url)) as Arc<dyn Reporter>,
        })
        .collect()
}
