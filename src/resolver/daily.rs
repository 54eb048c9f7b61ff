use async_trait::async_trait;
use chrono::{Datelike, FixedOffset, NaiveDate, Utc};

use crate::core::config::ResolverConfig;
use crate::core::error::ResolverError;
use crate::resolver::harbor::HarborResolver;
use crate::resolver::VersionResolver;

pub const DAILY_RESOLVER_NAME: &str = "daily";

/// Daily builds tagged `YYYY.MM.DD[.N]`, looked up in the internal registry.
pub struct DailyResolver {
    harbor: HarborResolver,
    offset: FixedOffset,
}

impl DailyResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let hours = config.daily.utc_offset_hours;
        let offset = FixedOffset::east_opt(hours * 3600)
            .ok_or_else(|| ResolverError::Configuration(format!("invalid utc offset {hours}h")))?;
        Ok(Self {
            harbor: HarborResolver::new(config)?,
            offset,
        })
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Pattern accepting every build of the month `date` falls in.
pub fn pattern_for(date: NaiveDate) -> String {
    format!(r"{:04}\.{:02}\.(\d+)(\.\d+)?", date.year(), date.month())
}

#[async_trait]
impl VersionResolver for DailyResolver {
    fn name(&self) -> &str {
        DAILY_RESOLVER_NAME
    }

    async fn resolve(&self, repository: &str, name: &str, pattern: &str) -> Result<String, ResolverError> {
        let pattern = if pattern.is_empty() {
            let synthesized = pattern_for(self.today());
            log::debug!("Using synthesized pattern {synthesized} for {name}");
            synthesized
        } else {
            String::from(pattern)
        };
        self.harbor.resolve(repository, name, &pattern).await
    }
}
