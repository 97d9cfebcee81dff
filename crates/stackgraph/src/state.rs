//! Deployed state - what the last execution left behind
//!
//! The planner never queries a provider. Everything it knows about live
//! resources arrives here, as an immutable input for one planning cycle.

use crate::catalog::ResourceKind;
use crate::types::{Attributes, Outputs, Reference};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Record of one provisioned resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    /// Structural dependencies when last applied
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
    /// Attributes as declared when last applied (references symbolic)
    #[serde(default)]
    pub attributes: Attributes,
    /// Attributes with references resolved against recorded outputs
    #[serde(default)]
    pub resolved: Attributes,
    /// Outputs published by the provider
    #[serde(default)]
    pub outputs: Outputs,
}

/// State of every resource provisioned so far, keyed by node id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedState {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
}

impl DeployedState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record of a node
    pub fn get(&self, id: &str) -> Option<&ResourceRecord> {
        self.resources.get(id)
    }

    /// Check if a node has been provisioned
    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    /// Insert or replace a record
    pub fn insert(&mut self, id: impl Into<String>, record: ResourceRecord) {
        self.resources.insert(id.into(), record);
    }

    /// Remove a record
    pub fn remove(&mut self, id: &str) -> Option<ResourceRecord> {
        self.resources.remove(id)
    }

    /// Number of recorded resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Look up a recorded output value
    pub fn output(&self, reference: &Reference) -> Option<&str> {
        self.resources
            .get(&reference.target)
            .and_then(|r| r.outputs.get(&reference.output))
            .map(String::as_str)
    }

    /// Resolve references in `attributes` against recorded outputs
    pub fn resolve(&self, attributes: &Attributes) -> Attributes {
        let lookup = |r: &Reference| self.output(r).map(str::to_string);
        attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.resolve(&lookup)))
            .collect()
    }

    /// Recorded dependency edges, node id -> ids it depended on
    pub fn edges(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.resources
            .iter()
            .map(|(id, record)| (id.clone(), record.depends_on.clone()))
            .collect()
    }

    /// Ids whose record lists `id` as a dependency
    pub fn dependents(&self, id: &str) -> BTreeSet<&str> {
        self.resources
            .iter()
            .filter(|(_, r)| r.depends_on.contains(id))
            .map(|(dependent, _)| dependent.as_str())
            .collect()
    }
}
