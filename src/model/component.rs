use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Image {
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Image {
    pub fn new(repository: &str, pattern: Option<&str>) -> Self {
        Self {
            repository: String::from(repository),
            pattern: pattern.map(String::from),
        }
    }

    pub fn pattern_or_empty(&self) -> &str {
        self.pattern.as_deref().unwrap_or("")
    }

    /// Reference of a resolved tag in `repository:tag` form.
    pub fn reference(&self, tag: &str) -> String {
        format!("{}:{tag}", self.repository)
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pattern {
            Some(pattern) => write!(f, "{} ({pattern})", self.repository),
            None => write!(f, "{}", self.repository),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub image: Image,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Component {
    pub fn new(name: &str, image: Image, source: Option<&str>) -> Self {
        Self {
            name: String::from(name),
            image,
            source: source.map(String::from),
            dependencies: Vec::new(),
            parent: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Component>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// Flattened view of a component list, restricted to checkable entries.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: Vec<Component>,
}

impl Catalog {
    /// Promotes single-level dependencies next to their parent, keeps the first occurrence of
    /// each name and drops entries whose source is missing or not accepted by `is_registered`.
    pub fn flatten<F>(roots: &[Component], is_registered: F) -> Self
        where F: Fn(&str) -> bool,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        let candidates = roots.iter()
            .flat_map(|root| {
                let deps = root.dependencies.iter()
                    .map(move |dep| Component {
                        dependencies: Vec::new(),
                        parent: Some(root.name.clone()),
                        ..dep.clone()
                    });
                [Component { dependencies: Vec::new(), ..root.clone() }].into_iter().chain(deps)
            });

        for component in candidates {
            if !seen.insert(component.name.clone()) {
                log::debug!("Skipping duplicate component {}", component.name);
                continue;
            }
            match component.source.as_deref() {
                None => log::debug!("Component {} has no source, skipping", component.name),
                Some(source) if !is_registered(source) => {
                    log::warn!("Component {} refers to unregistered source '{source}', skipping", component.name)
                }
                Some(_) => entries.push(component),
            }
        }

        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.entries.iter().find(|component| component.name.eq(name))
    }

    pub fn iter(&self) -> impl Iterator<Item=&Component> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
