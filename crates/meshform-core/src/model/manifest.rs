//! Manifest: every resource declared in one resource file

use meshform_cloud::DesiredConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Resources in declaration order.
///
/// Each entry is reconciled on its own; the order only matters for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Project name (`project "<name>"`, or the file's directory name)
    pub name: String,
    pub resources: Vec<DesiredConfig>,
    /// Values from the `variables { }` block after template expansion
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl Manifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, family: &str, name: &str) -> Option<&DesiredConfig> {
        self.resources
            .iter()
            .find(|r| r.family() == family && r.name() == name)
    }

    pub fn contains(&self, family: &str, name: &str) -> bool {
        self.get(family, name).is_some()
    }

    pub fn by_family<'a>(&'a self, family: &'a str) -> impl Iterator<Item = &'a DesiredConfig> {
        self.resources.iter().filter(move |r| r.family() == family)
    }

    /// Families used by this manifest, sorted
    pub fn families(&self) -> BTreeSet<&str> {
        self.resources.iter().map(DesiredConfig::family).collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
