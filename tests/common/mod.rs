#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tagwatch::core::error::ResolverError;
use tagwatch::model::component::{Component, Image};
use tagwatch::resolver::VersionResolver;

#[derive(Clone, Debug)]
pub enum Scripted {
    Version(&'static str),
    NotFound,
    Timeout,
    Broken,
}

/// Resolver answering from a per component script and counting the calls it receives.
pub struct ScriptedResolver {
    name: &'static str,
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedResolver {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn answer(self, component: &str, outcome: Scripted) -> Self {
        self.set(component, outcome);
        self
    }

    pub fn set(&self, component: &str, outcome: Scripted) {
        self.script.lock().unwrap().insert(String::from(component), outcome);
    }

    pub fn calls(&self, component: &str) -> usize {
        self.calls.lock().unwrap().get(component).copied().unwrap_or_default()
    }
}

#[async_trait]
impl VersionResolver for ScriptedResolver {
    fn name(&self) -> &str {
        self.name
    }

    async fn resolve(&self, _repository: &str, name: &str, _pattern: &str) -> Result<String, ResolverError> {
        *self.calls.lock().unwrap().entry(String::from(name)).or_default() += 1;
        let outcome = self.script.lock().unwrap().get(name).cloned();
        match outcome {
            Some(Scripted::Version(version)) => Ok(String::from(version)),
            Some(Scripted::NotFound) | None => Err(ResolverError::ImageVersionNotFound(format!("no tag for {name}"))),
            Some(Scripted::Timeout) => Err(ResolverError::RequestTimeout { millis: 10 }),
            Some(Scripted::Broken) => Err(ResolverError::Upstream(format!("{name} upstream is broken"))),
        }
    }
}

pub fn component(name: &str, source: &str) -> Component {
    Component::new(name, Image::new(&format!("harbor.local/team/{name}"), None), Some(source))
}

/// Polls `check` until it holds or the timeout elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output=bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
