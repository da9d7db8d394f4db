//! Resource dependency graph
//!
//! Orders resources into creation waves: every resource appears in a later
//! wave than everything it depends on, and resources inside one wave are
//! independent of each other so they can be created concurrently.

use crate::action::Action;
use crate::error::{CloudError, Result};
use crate::provider::ResourceSet;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// key -> keys it depends on
    edges: BTreeMap<String, BTreeSet<String>>,
    levels: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Build from a declared resource set; every dependency must be declared
    pub fn from_resources(resources: &ResourceSet) -> Result<Self> {
        let mut edges = BTreeMap::new();
        for resource in resources.iter() {
            for dep in &resource.depends_on {
                if resources.get_key(dep).is_none() {
                    return Err(CloudError::InvalidConfig(format!(
                        "{} depends on undeclared resource {}",
                        resource.key(),
                        dep
                    )));
                }
            }
            edges.insert(
                resource.key(),
                resource.depends_on.iter().cloned().collect(),
            );
        }
        Self::build(edges)
    }

    /// Build from plan actions; dependencies outside the plan are already satisfied
    pub fn from_actions<'a>(actions: impl IntoIterator<Item = &'a Action>) -> Result<Self> {
        let actions: Vec<&Action> = actions.into_iter().collect();
        let keys: BTreeSet<&str> = actions.iter().map(|a| a.id.as_str()).collect();

        let edges = actions
            .iter()
            .map(|a| {
                let deps = a
                    .depends_on
                    .iter()
                    .filter(|d| keys.contains(d.as_str()))
                    .cloned()
                    .collect();
                (a.id.clone(), deps)
            })
            .collect();
        Self::build(edges)
    }

    fn build(edges: BTreeMap<String, BTreeSet<String>>) -> Result<Self> {
        let mut remaining = edges.clone();
        let mut done: BTreeSet<String> = BTreeSet::new();
        let mut levels = Vec::new();

        while !remaining.is_empty() {
            // BTreeMap iteration keeps each wave sorted by key
            let wave: Vec<String> = remaining
                .iter()
                .filter(|(_, deps)| deps.iter().all(|d| done.contains(d)))
                .map(|(key, _)| key.clone())
                .collect();

            if wave.is_empty() {
                return Err(CloudError::DependencyCycle(
                    remaining.into_keys().collect(),
                ));
            }

            for key in &wave {
                remaining.remove(key);
                done.insert(key.clone());
            }
            levels.push(wave);
        }

        Ok(Self { edges, levels })
    }

    /// Creation waves in dependency order
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// All keys, dependencies first
    pub fn creation_order(&self) -> Vec<String> {
        self.levels.iter().flatten().cloned().collect()
    }

    /// All keys, dependents first
    pub fn destroy_order(&self) -> Vec<String> {
        let mut order = self.creation_order();
        order.reverse();
        order
    }

    pub fn dependencies(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(key)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
