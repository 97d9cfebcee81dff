//! Resource nodes and the declarations they are built from
//!
//! A node is one declared resource. Its dependencies are never declared
//! directly; they are derived from the references in its attributes.

use crate::catalog::ResourceKind;
use crate::types::{AttributeValue, Attributes, Reference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One declared resource in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Unique identifier within the graph
    pub id: String,
    /// Kind of resource, looked up in the catalog
    pub kind: ResourceKind,
    /// Declared attributes (references still symbolic)
    pub attributes: Attributes,
    /// Ids this node must be created after (filled in by validation)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: ResourceKind, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes,
            depends_on: BTreeSet::new(),
        }
    }

    /// Iterate `(attribute, reference)` pairs in attribute order
    pub fn references(&self) -> impl Iterator<Item = (&str, &Reference)> {
        self.attributes
            .iter()
            .flat_map(|(name, value)| value.references().into_iter().map(move |r| (name.as_str(), r)))
    }

    /// Get an attribute value
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

/// A reference declared alongside a node rather than inline in its attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredReference {
    pub attribute: String,
    pub target: String,
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_output() -> String {
    "id".to_string()
}

/// Declaration input: `(id, kind, attributes, references)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub references: Vec<DeclaredReference>,
}

impl Declaration {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: Attributes::new(),
            references: Vec::new(),
        }
    }

    /// Set a literal (or inline reference) attribute
    pub fn attr(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Declare a reference from `attribute` to `target`'s `output`
    pub fn reference(mut self, attribute: &str, target: &str, output: &str) -> Self {
        self.references.push(DeclaredReference {
            attribute: attribute.to_string(),
            target: target.to_string(),
            output: output.to_string(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_references_in_attribute_order() {
        let mut attributes = Attributes::new();
        attributes.insert("target".into(), AttributeValue::reference("asg1", "name"));
        attributes.insert("loadBalancer".into(), AttributeValue::reference("alb1", "arn"));
        attributes.insert("port".into(), AttributeValue::integer(80));
        let node = ResourceNode::new("l1", ResourceKind::Listener, attributes);

        let refs: Vec<(&str, &str)> = node
            .references()
            .map(|(attr, r)| (attr, r.target.as_str()))
            .collect();
        assert_eq!(refs, vec![("loadBalancer", "alb1"), ("target", "asg1")]);
    }

    #[test]
    fn test_declaration_from_toml() {
        let decl: Declaration = toml::from_str(
            r#"
            id = "lt1"
            kind = "LaunchTemplate"

            [attributes]
            instanceType = "t2.micro"
            securityGroup = { ref = "sg1", output = "id" }

            [[references]]
            attribute = "role"
            target = "role1"
            output = "arn"
            "#,
        )
        .unwrap();

        assert_eq!(decl.kind, ResourceKind::LaunchTemplate);
        assert_eq!(
            decl.attributes.get("securityGroup"),
            Some(&AttributeValue::reference("sg1", "id"))
        );
        assert_eq!(decl.references[0].target, "role1");
    }

    #[test]
    fn test_declared_reference_defaults_to_id_output() {
        let decl: Declaration = toml::from_str(
            r#"
            id = "lt1"
            kind = "LaunchTemplate"
            references = [{ attribute = "securityGroup", target = "sg1" }]
            "#,
        )
        .unwrap();
        assert_eq!(decl.references[0].output, "id");
    }
}
