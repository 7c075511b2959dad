//! Named groups of error managers.

use std::collections::BTreeMap;

use super::ErrorManager;

/// Manager groups keyed by name.
///
/// Groups are consulted in ascending name order, managers within a group in
/// registration order.
#[derive(Clone, Debug, Default)]
pub struct ManagerRegistry {
    groups: BTreeMap<String, Vec<ErrorManager>>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the group `name`. An empty list removes it.
    pub fn register(&mut self, name: impl Into<String>, managers: Vec<ErrorManager>) {
        let name = name.into();
        if managers.is_empty() {
            if self.groups.remove(&name).is_some() {
                tracing::debug!(group = %name, "removed error managers");
            }
            return;
        }
        tracing::debug!(group = %name, count = managers.len(), "registered error managers");
        self.groups.insert(name, managers);
    }

    /// Every manager in consultation order.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorManager> {
        self.groups.values().flatten()
    }

    /// Group names in consultation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }
}
