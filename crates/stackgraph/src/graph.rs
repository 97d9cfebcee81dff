//! Graph builder - assembles declared nodes into an unvalidated graph
//!
//! Building is pure data assembly: no provider is contacted and no
//! ordering is assumed from the order nodes were added in.

use crate::catalog::ResourceKind;
use crate::error::{Error, Result};
use crate::resource::{Declaration, ResourceNode};
use crate::types::{AttributeValue, Attributes, Reference};
use std::collections::BTreeMap;

/// In-progress resource graph
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<String, ResourceNode>,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from declarations in any order
    ///
    /// Every node is registered before any declared reference is attached,
    /// so a declaration may reference one that appears later.
    pub fn from_declarations<I>(declarations: I) -> Result<Self>
    where
        I: IntoIterator<Item = Declaration>,
    {
        let declarations: Vec<Declaration> = declarations.into_iter().collect();
        let mut graph = Self::new();

        for decl in &declarations {
            graph.add_node(&decl.id, decl.kind, decl.attributes.clone())?;
        }

        for decl in &declarations {
            for r in &decl.references {
                graph.add_reference(&decl.id, &r.attribute, &r.target, &r.output)?;
            }
        }

        log::debug!("Built graph with {} nodes", graph.len());
        Ok(graph)
    }

    /// Register a node
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        kind: ResourceKind,
        attributes: Attributes,
    ) -> Result<()> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateId { id });
        }
        self.nodes
            .insert(id.clone(), ResourceNode::new(id, kind, attributes));
        Ok(())
    }

    /// Point `from.attribute` at `to.output`
    ///
    /// Both ids must already be registered. A list attribute gets the
    /// reference appended; any other existing value becomes a two-element list.
    pub fn add_reference(&mut self, from: &str, attribute: &str, to: &str, output: &str) -> Result<()> {
        if !self.nodes.contains_key(to) {
            return Err(Error::UnknownId { id: to.to_string() });
        }
        let node = self
            .nodes
            .get_mut(from)
            .ok_or_else(|| Error::UnknownId { id: from.to_string() })?;

        let reference = AttributeValue::Reference(Reference::new(to, output));
        match node.attributes.remove(attribute) {
            None => {
                node.attributes.insert(attribute.to_string(), reference);
            }
            Some(AttributeValue::List(mut items)) => {
                items.push(reference);
                node.attributes
                    .insert(attribute.to_string(), AttributeValue::List(items));
            }
            Some(existing) => {
                node.attributes.insert(
                    attribute.to_string(),
                    AttributeValue::List(vec![existing, reference]),
                );
            }
        }
        Ok(())
    }

    /// Remove a node, returning it if it existed
    ///
    /// References to the removed node from other nodes are left in place
    /// and will be reported by validation.
    pub fn remove_node(&mut self, id: &str) -> Option<ResourceNode> {
        self.nodes.remove(id)
    }

    /// Get a node by id
    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Check if a node is registered
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterate nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn into_nodes(self) -> BTreeMap<String, ResourceNode> {
        self.nodes
    }
}
