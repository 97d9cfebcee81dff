//! Validator - checks a graph against the catalog before anything is planned
//!
//! All problems are collected in one pass so callers see the complete set.
//! Only structural references become dependency edges; configuration
//! references are checked for existence and kind but never order anything,
//! which is what lets a security group name itself as a peer.

use crate::catalog::Catalog;
use crate::error::ValidationError;
use crate::graph::Graph;
use crate::planner::topological_order;
use crate::resource::ResourceNode;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A graph that passed validation; read-only from here on
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    nodes: BTreeMap<String, ResourceNode>,
    catalog: Catalog,
}

impl ValidatedGraph {
    /// Get a node by id
    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Iterate nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    /// Catalog the graph was validated against
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Structural dependency edges, node id -> ids it depends on
    pub fn edges(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.depends_on.clone()))
            .collect()
    }

    /// Node ids that directly depend on `id`
    pub fn dependents(&self, id: &str) -> BTreeSet<&str> {
        self.nodes
            .values()
            .filter(|n| n.depends_on.contains(id))
            .map(|n| n.id.as_str())
            .collect()
    }

    /// Dependencies first, ties broken by id
    pub fn create_order(&self) -> Vec<String> {
        topological_order(&self.edges())
    }
}

/// Validate a graph against a catalog
pub fn validate(graph: Graph, catalog: &Catalog) -> Result<ValidatedGraph, Vec<ValidationError>> {
    let mut nodes = graph.into_nodes();
    let mut errors = Vec::new();
    let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for node in nodes.values() {
        let deps = check_node(node, &nodes, catalog, &mut errors);
        edges.insert(node.id.clone(), deps);
    }

    for path in find_cycles(&edges) {
        errors.push(ValidationError::CycleDetected { path });
    }

    if !errors.is_empty() {
        log::debug!("Validation found {} error(s)", errors.len());
        return Err(errors);
    }

    for (id, deps) in edges {
        if let Some(node) = nodes.get_mut(&id) {
            node.depends_on = deps;
        }
    }

    Ok(ValidatedGraph {
        nodes,
        catalog: catalog.clone(),
    })
}

/// Check one node, returning the ids of its structural dependencies
fn check_node(
    node: &ResourceNode,
    nodes: &BTreeMap<String, ResourceNode>,
    catalog: &Catalog,
    errors: &mut Vec<ValidationError>,
) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();

    let Some(schema) = catalog.get(node.kind) else {
        errors.push(ValidationError::UnknownKind {
            node: node.id.clone(),
            kind: node.kind,
        });
        return deps;
    };

    for required in &schema.required {
        if !node.attributes.contains_key(required) {
            errors.push(ValidationError::MissingAttribute {
                node: node.id.clone(),
                kind: node.kind,
                attribute: required.clone(),
            });
        }
    }

    for (name, value) in &node.attributes {
        if !schema.is_known(name) {
            errors.push(ValidationError::UnknownAttribute {
                node: node.id.clone(),
                kind: node.kind,
                attribute: name.clone(),
            });
            continue;
        }

        let rule = schema.reference_rule(name);
        for reference in value.references() {
            let Some(target) = nodes.get(&reference.target) else {
                errors.push(ValidationError::UnknownId {
                    node: node.id.clone(),
                    attribute: name.clone(),
                    target: reference.target.clone(),
                });
                continue;
            };

            let Some(rule) = rule.filter(|r| r.allows(target.kind)) else {
                errors.push(ValidationError::TypeMismatch {
                    node: node.id.clone(),
                    attribute: name.clone(),
                    target: target.id.clone(),
                    expected: rule.map(|r| r.allowed.clone()).unwrap_or_default(),
                    found: target.kind,
                });
                continue;
            };

            // An unknown target kind is already reported against the target
            if let Some(target_schema) = catalog.get(target.kind)
                && !target_schema.has_output(&reference.output)
            {
                errors.push(ValidationError::UnknownOutput {
                    node: node.id.clone(),
                    attribute: name.clone(),
                    target: target.id.clone(),
                    output: reference.output.clone(),
                });
                continue;
            }

            if rule.is_structural() {
                deps.insert(target.id.clone());
            }
        }
    }

    deps
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Find reference cycles with a depth-first walk in id order
///
/// A back-edge to a node still on the recursion stack is a cycle; the path
/// runs from that node around to itself (`[a, b, a]`).
pub(crate) fn find_cycles(edges: &BTreeMap<String, BTreeSet<String>>) -> Vec<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut cycles = Vec::new();

    for id in edges.keys() {
        if !marks.contains_key(id.as_str()) {
            visit(id, edges, &mut marks, &mut stack, &mut cycles);
        }
    }

    cycles
}

fn visit<'a>(
    id: &'a str,
    edges: &'a BTreeMap<String, BTreeSet<String>>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    marks.insert(id, Mark::Visiting);
    stack.push(id);

    if let Some(deps) = edges.get(id) {
        for dep in deps {
            match marks.get(dep.as_str()) {
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|s| *s == dep).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..].iter().map(|s| (*s).to_string()).collect();
                    path.push(dep.clone());
                    cycles.push(path);
                }
                Some(Mark::Done) => {}
                None if edges.contains_key(dep) => visit(dep, edges, marks, stack, cycles),
                None => {}
            }
        }
    }

    stack.pop();
    marks.insert(id, Mark::Done);
}
