//! Diff computation between declared nodes and deployed state

use crate::catalog::Catalog;
use crate::resource::ResourceNode;
use crate::state::DeployedState;
use crate::types::{AttributeValue, Attributes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a declared node differs from its deployed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// Not deployed yet
    Create,
    /// Deployed, differs, and the kind updates in place
    Update,
    /// Deployed, differs, and must be deleted then created
    Replace,
    /// Deployed and identical
    Unchanged,
}

impl Change {
    /// Whether the node's outputs may change (dependents must be revisited)
    pub fn changes_identity(&self) -> bool {
        matches!(self, Self::Create | Self::Replace)
    }

    /// Escalate an unchanged node whose references will resolve differently
    pub fn escalate(self, updatable: bool) -> Self {
        match self {
            Self::Unchanged if updatable => Self::Update,
            Self::Unchanged => Self::Replace,
            other => other,
        }
    }
}

/// Classify a node against its deployed record
///
/// Only the node's own kind and attributes are compared here, plus the
/// resolution of its references against recorded outputs; changes that
/// ripple in from dependencies are applied by the planner.
pub fn classify(node: &ResourceNode, previous: &DeployedState, catalog: &Catalog) -> Change {
    let Some(record) = previous.get(&node.id) else {
        return Change::Create;
    };

    if record.kind != node.kind {
        return Change::Replace;
    }

    let unchanged =
        record.attributes == node.attributes && previous.resolve(&node.attributes) == record.resolved;
    if unchanged {
        Change::Unchanged
    } else if catalog.is_updatable(node.kind) {
        Change::Update
    } else {
        Change::Replace
    }
}

/// A single attribute that differs between two attribute sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub name: String,
    pub before: Option<AttributeValue>,
    pub after: Option<AttributeValue>,
}

impl AttributeChange {
    pub fn is_addition(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }

    pub fn is_removal(&self) -> bool {
        self.before.is_some() && self.after.is_none()
    }
}

/// Attributes that were added, removed, or changed, in name order
pub fn attribute_changes(before: &Attributes, after: &Attributes) -> Vec<AttributeChange> {
    let names: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    names
        .into_iter()
        .filter_map(|name| {
            let b = before.get(name);
            let a = after.get(name);
            (b != a).then(|| AttributeChange {
                name: name.clone(),
                before: b.cloned(),
                after: a.cloned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceKind;
    use crate::state::ResourceRecord;
    use crate::types::Outputs;

    fn template(user_data: &str) -> ResourceNode {
        let mut attributes = Attributes::new();
        attributes.insert("machineImage".into(), AttributeValue::string("ami-1"));
        attributes.insert("userData".into(), AttributeValue::string(user_data));
        ResourceNode::new("lt1", ResourceKind::LaunchTemplate, attributes)
    }

    fn deployed(node: &ResourceNode) -> DeployedState {
        let mut state = DeployedState::new();
        state.insert(
            node.id.clone(),
            ResourceRecord {
                kind: node.kind,
                attributes: node.attributes.clone(),
                resolved: node.attributes.clone(),
                outputs: Outputs::new(),
                depends_on: BTreeSet::new(),
            },
        );
        state
    }

    #[test]
    fn test_classify() {
        let catalog = Catalog::standard();
        let node = template("echo one");
        let state = deployed(&node);

        assert_eq!(classify(&node, &DeployedState::new(), &catalog), Change::Create);
        assert_eq!(classify(&node, &state, &catalog), Change::Unchanged);
        assert_eq!(classify(&template("echo two"), &state, &catalog), Change::Replace);
    }

    #[test]
    fn test_classify_kind_change_replaces() {
        let catalog = Catalog::standard();
        let node = template("echo one");
        let mut state = deployed(&node);
        state.resources.get_mut("lt1").unwrap().kind = ResourceKind::Role;
        assert_eq!(classify(&node, &state, &catalog), Change::Replace);
    }

    #[test]
    fn test_escalate() {
        assert_eq!(Change::Unchanged.escalate(true), Change::Update);
        assert_eq!(Change::Unchanged.escalate(false), Change::Replace);
        assert_eq!(Change::Create.escalate(false), Change::Create);
        assert_eq!(Change::Update.escalate(false), Change::Update);
    }

    #[test]
    fn test_attribute_changes() {
        let before = template("echo one").attributes;
        let mut after = template("echo two").attributes;
        after.remove("machineImage");
        after.insert("role".into(), AttributeValue::reference("role1", "arn"));

        let changes = attribute_changes(&before, &after);
        let names: Vec<&str> = changes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["machineImage", "role", "userData"]);
        assert!(changes[0].is_removal());
        assert!(changes[1].is_addition());
    }
}
