use std::path::{Path, PathBuf};

use async_trait::async_trait;
use config::{Config, File};
use serde::Deserialize;

use crate::core::error::ControllerError;
use crate::model::component::Component;

/// Supplier of the root component list of a catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self) -> Result<Vec<Component>, ControllerError>;
}

#[derive(Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    components: Vec<Component>,
}

/// Reads a `components` list from a yaml, toml or json document.
#[derive(Clone, Debug)]
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn load(&self) -> Result<Vec<Component>, ControllerError> {
        let document: CatalogDocument = Config::builder()
            .add_source(File::from(self.path.as_path()))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<CatalogDocument>())
            .map_err(|err| ControllerError::Catalog(format!("{} - {err}", self.path.display())))?;
        log::debug!("Loaded {} root components from {}", document.components.len(), self.path.display());
        Ok(document.components)
    }
}

#[derive(Clone, Debug, Default)]
pub struct StaticCatalogSource {
    components: Vec<Component>,
}

impl StaticCatalogSource {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn load(&self) -> Result<Vec<Component>, ControllerError> {
        Ok(self.components.clone())
    }
}
