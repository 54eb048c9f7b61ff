use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::config::ResolverConfig;
use crate::core::error::ResolverError;
use crate::resolver::daily::{DailyResolver, DAILY_RESOLVER_NAME};
use crate::resolver::fleet::{FleetResolver, FLEET_RESOLVER_NAME};
use crate::resolver::harbor::{HarborResolver, HARBOR_RESOLVER_NAME};
use crate::resolver::hub::{HubResolver, HUB_RESOLVER_NAME};
use crate::resolver::VersionResolver;

/// Built-in resolvers in registration order.
pub const BUILTIN_RESOLVERS: [&str; 4] = [HUB_RESOLVER_NAME, HARBOR_RESOLVER_NAME, DAILY_RESOLVER_NAME, FLEET_RESOLVER_NAME];

fn build_builtin(name: &str, config: &ResolverConfig) -> Result<Arc<dyn VersionResolver>, ResolverError> {
    match name {
        HUB_RESOLVER_NAME => Ok(Arc::new(HubResolver::new(config)?) as Arc<dyn VersionResolver>),
        HARBOR_RESOLVER_NAME => Ok(Arc::new(HarborResolver::new(config)?) as Arc<dyn VersionResolver>),
        DAILY_RESOLVER_NAME => Ok(Arc::new(DailyResolver::new(config)?) as Arc<dyn VersionResolver>),
        FLEET_RESOLVER_NAME => Ok(Arc::new(FleetResolver::new(config)?) as Arc<dyn VersionResolver>),
        other => Err(ResolverError::Configuration(format!("unknown built-in resolver {other}"))),
    }
}

/// Name keyed resolver dispatch, written at load time and read by the controllers.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: Arc<RwLock<HashMap<String, Arc<dyn VersionResolver>>>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers the built-in resolvers in a fixed order. A resolver whose configuration is
    /// missing is left out.
    pub fn with_builtins(config: &ResolverConfig) -> Self {
        let registry = Self::new();
        for name in BUILTIN_RESOLVERS {
            match build_builtin(name, config) {
                Ok(resolver) => registry.register(resolver),
                Err(err) => log::warn!("Resolver {name} disabled - {err}"),
            }
        }
        registry
    }

    /// Later registrations under an existing name replace the earlier resolver.
    pub fn register(&self, resolver: Arc<dyn VersionResolver>) {
        let name = String::from(resolver.name());
        let mut guard = match self.resolvers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.contains_key(&name) {
            log::warn!("Resolver {name} is already registered, overwriting it");
        } else {
            log::info!("Registered resolver {name}");
        }
        guard.insert(name, resolver);
    }

    pub fn dispatch(&self, source: &str) -> Option<Arc<dyn VersionResolver>> {
        let guard = match self.resolvers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(source).cloned()
    }

    pub fn is_registered(&self, source: &str) -> bool {
        self.dispatch(source).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let guard = match self.resolvers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut names = guard.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}
