use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub fn compose_config<'de, CFG: Deserialize<'de>>(external_path: &str, env_prefix: &str) -> Result<CFG, ConfigError> {
    Config::builder()

        // Add in a local configuration file
        .add_source(File::with_name(external_path).required(false))

        // Add in settings from the environment (e.g. TAGWATCH_RESOLVER__HARBOR__URL)
        .add_source(Environment::with_prefix(env_prefix).prefix_separator("_").separator("__"))

        .build()?
        .try_deserialize()
}

#[derive(Deserialize, Clone, Debug)]
pub struct TagwatchConfig {
    #[serde(default = "default_address")]
    pub address: SocketAddr,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub teams: HashMap<String, PathBuf>,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_reporters")]
    pub reporters: Vec<ReporterConfig>,
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_namespace() -> String {
    String::from("default")
}

fn default_reporters() -> Vec<ReporterConfig> {
    vec![ReporterConfig::Log]
}

#[derive(Deserialize, Clone, Debug)]
pub struct ResolverConfig {
    #[serde(default = "default_deadline_millis")]
    pub deadline_millis: u64,
    #[serde(default = "default_page_timeout_millis")]
    pub page_timeout_millis: u64,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub harbor: HarborConfig,
    #[serde(default)]
    pub daily: DailyConfig,
    #[serde(default)]
    pub fleet: FleetInventoryConfig,
}

impl ResolverConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_millis)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_millis)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            deadline_millis: default_deadline_millis(),
            page_timeout_millis: default_page_timeout_millis(),
            hub: Default::default(),
            harbor: Default::default(),
            daily: Default::default(),
            fleet: Default::default(),
        }
    }
}

fn default_deadline_millis() -> u64 {
    30_000
}

fn default_page_timeout_millis() -> u64 {
    10_000
}

fn default_page_size() -> usize {
    100
}

#[derive(Deserialize, Clone, Debug)]
pub struct HubConfig {
    #[serde(default = "default_docker_hub_url")]
    pub docker_hub_url: String,
    #[serde(default = "default_quay_url")]
    pub quay_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            docker_hub_url: default_docker_hub_url(),
            quay_url: default_quay_url(),
            page_size: default_page_size(),
        }
    }
}

fn default_docker_hub_url() -> String {
    String::from("https://hub.docker.com")
}

fn default_quay_url() -> String {
    String::from("https://quay.io")
}

#[derive(Deserialize, Clone, Debug)]
pub struct HarborConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for HarborConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            page_size: default_page_size(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct DailyConfig {
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self { utc_offset_hours: default_utc_offset_hours() }
    }
}

fn default_utc_offset_hours() -> i32 {
    8
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct FleetInventoryConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub service: Option<String>,
    pub dc: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub app_ids: HashMap<String, String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FleetConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_retention")]
    pub retention: usize,
    #[serde(default = "default_backoff_base_millis")]
    pub backoff_base_millis: u64,
    #[serde(default = "default_backoff_max_millis")]
    pub backoff_max_millis: u64,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
}

impl FleetConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_millis)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_millis)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            retention: default_retention(),
            backoff_base_millis: default_backoff_base_millis(),
            backoff_max_millis: default_backoff_max_millis(),
            health_interval_secs: default_health_interval_secs(),
        }
    }
}

fn default_workers() -> usize {
    1
}

fn default_retention() -> usize {
    10
}

fn default_backoff_base_millis() -> u64 {
    5
}

fn default_backoff_max_millis() -> u64 {
    60_000
}

fn default_health_interval_secs() -> u64 {
    60
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Memory,
    Kubernetes,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReporterConfig {
    Log,
    Rest { url: String },
}
