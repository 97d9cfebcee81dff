//! Planner - turns a validated graph and deployed state into an ordered plan
//!
//! Ordering is Kahn's algorithm with the ready set kept sorted by id, so the
//! same inputs always give the same plan, byte for byte.

use crate::catalog::ResourceKind;
use crate::diff::{Change, classify};
use crate::error::Result;
use crate::resource::ResourceNode;
use crate::state::{DeployedState, ResourceRecord};
use crate::types::Attributes;
use crate::validator::ValidatedGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// What a plan step does to its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    NoOp,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::NoOp => "noop",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Position in the plan
    pub index: usize,
    pub node_id: String,
    pub kind: ResourceKind,
    pub action: Action,
    /// Declared attributes (for deletes, the attributes last applied)
    pub attributes: Attributes,
    /// Node ids this node is created after
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
    /// Steps that must succeed before this one is dispatched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<usize>,
}

/// Counts of actions in a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub noop: usize,
}

impl PlanSummary {
    /// Number of steps that change something
    pub fn changes(&self) -> usize {
        self.create + self.update + self.delete
    }
}

/// An ordered sequence of steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the plan has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check if applying the plan would change nothing
    pub fn is_noop(&self) -> bool {
        self.steps.iter().all(|s| s.action == Action::NoOp)
    }

    /// Node ids in step order
    pub fn node_order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.node_id.as_str()).collect()
    }

    /// Steps touching a node, in order
    pub fn steps_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a PlanStep> {
        self.steps.iter().filter(move |s| s.node_id == node_id)
    }

    /// Count steps by action
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for step in &self.steps {
            match step.action {
                Action::Create => summary.create += 1,
                Action::Update => summary.update += 1,
                Action::Delete => summary.delete += 1,
                Action::NoOp => summary.noop += 1,
            }
        }
        summary
    }

    /// Serialize for inspection or audit before apply
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn push(&mut self, node_id: &str, spec: StepSpec, action: Action, after: BTreeSet<usize>) -> usize {
        let index = self.steps.len();
        self.steps.push(PlanStep {
            index,
            node_id: node_id.to_string(),
            kind: spec.kind,
            action,
            attributes: spec.attributes,
            depends_on: spec.depends_on,
            after: after.into_iter().collect(),
        });
        index
    }
}

/// What a step carries about its node
struct StepSpec {
    kind: ResourceKind,
    attributes: Attributes,
    depends_on: BTreeSet<String>,
}

impl StepSpec {
    fn of_node(node: &ResourceNode) -> Self {
        Self {
            kind: node.kind,
            attributes: node.attributes.clone(),
            depends_on: node.depends_on.clone(),
        }
    }

    fn of_record(record: &ResourceRecord) -> Self {
        Self {
            kind: record.kind,
            attributes: record.attributes.clone(),
            depends_on: record.depends_on.clone(),
        }
    }
}

/// Order node ids so every node follows the ids it depends on
///
/// Dependencies that are not keys of `edges` are ignored. Nodes caught in a
/// cycle are appended in id order.
pub fn topological_order(edges: &BTreeMap<String, BTreeSet<String>>) -> Vec<String> {
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for (id, deps) in edges {
        let known: Vec<&str> = deps
            .iter()
            .map(String::as_str)
            .filter(|d| edges.contains_key(*d))
            .collect();
        pending.insert(id.as_str(), known.len());
        for dep in known {
            dependents.entry(dep).or_default().push(id.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order: Vec<String> = Vec::with_capacity(edges.len());

    while let Some(id) = ready.pop_first() {
        order.push(id.to_string());
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() < edges.len() {
        let placed: BTreeSet<String> = order.iter().cloned().collect();
        let stuck: Vec<String> = edges.keys().filter(|id| !placed.contains(*id)).cloned().collect();
        log::warn!("Dependency cycle among: {}", stuck.join(", "));
        order.extend(stuck);
    }

    order
}

/// Plan the changes that bring `previous` in line with the graph
pub fn plan(graph: &ValidatedGraph, previous: &DeployedState) -> Plan {
    let order = graph.create_order();
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let changes = classify_all(graph, previous, &order);

    let mut plan = Plan::default();
    let mut final_step: HashMap<String, usize> = HashMap::new();
    let mut delete_step: HashMap<String, usize> = HashMap::new();

    for id in &order {
        let Some(node) = graph.get(id) else { continue };
        let change = changes.get(id).copied().unwrap_or(Change::Create);

        let mut after: BTreeSet<usize> = node
            .depends_on
            .iter()
            .filter_map(|dep| final_step.get(dep).copied())
            .collect();

        let action = match change {
            Change::Create => Action::Create,
            Change::Update => Action::Update,
            Change::Unchanged => Action::NoOp,
            Change::Replace => {
                if !delete_step.contains_key(id) {
                    emit_replacement_deletes(
                        graph,
                        previous,
                        id,
                        &changes,
                        &position,
                        &mut plan,
                        &mut delete_step,
                    );
                }
                after.extend(delete_step.get(id).copied());
                Action::Create
            }
        };

        let index = plan.push(id, StepSpec::of_node(node), action, after);
        final_step.insert(id.clone(), index);
    }

    emit_orphan_deletes(graph, previous, &final_step, &mut plan, &mut delete_step);

    log::debug!(
        "Planned {} step(s) for {} node(s)",
        plan.len(),
        graph.len()
    );
    plan
}

/// Classify every node, then push identity changes out to dependents
///
/// A node whose reference target is created or replaced will see a new
/// value even if its own declaration did not change.
fn classify_all(
    graph: &ValidatedGraph,
    previous: &DeployedState,
    order: &[String],
) -> HashMap<String, Change> {
    let catalog = graph.catalog();
    let mut changes: HashMap<String, Change> = graph
        .nodes()
        .map(|n| (n.id.clone(), classify(n, previous, catalog)))
        .collect();

    loop {
        let mut escalated = false;
        for id in order {
            let Some(node) = graph.get(id) else { continue };
            if changes.get(id) != Some(&Change::Unchanged) {
                continue;
            }
            let touched = node.references().any(|(_, r)| {
                r.target != node.id
                    && changes
                        .get(&r.target)
                        .is_some_and(Change::changes_identity)
            });
            if touched {
                let next = Change::Unchanged.escalate(catalog.is_updatable(node.kind));
                log::debug!("{id}: reference target changed, escalating to {next:?}");
                changes.insert(id.clone(), next);
                escalated = true;
            }
        }
        if !escalated {
            break;
        }
    }

    changes
}

/// Emit deletes for `id` and every replaced node that transitively depends on it
///
/// Dependents are deleted first. Each delete waits for the deletes of the
/// replaced nodes that depend on it.
fn emit_replacement_deletes(
    graph: &ValidatedGraph,
    previous: &DeployedState,
    id: &str,
    changes: &HashMap<String, Change>,
    position: &HashMap<&str, usize>,
    plan: &mut Plan,
    delete_step: &mut HashMap<String, usize>,
) {
    let mut targets: Vec<&str> = transitive_dependents(graph, id)
        .into_iter()
        .filter(|d| changes.get(*d) == Some(&Change::Replace) && !delete_step.contains_key(*d))
        .collect();
    targets.push(id);
    targets.sort_by_key(|t| std::cmp::Reverse(position.get(t).copied().unwrap_or(0)));

    for target in targets {
        let Some(record) = previous.get(target) else { continue };
        emit_dependent_orphan_deletes(graph, previous, target, plan, delete_step);
        let after: BTreeSet<usize> = transitive_dependents(graph, target)
            .into_iter()
            .chain(recorded_dependents(previous, target))
            .filter_map(|d| delete_step.get(d).copied())
            .collect();
        let index = plan.push(target, StepSpec::of_record(record), Action::Delete, after);
        delete_step.insert(target.to_string(), index);
    }
}

fn transitive_dependents<'a>(graph: &'a ValidatedGraph, id: &str) -> BTreeSet<&'a str> {
    let mut seen: BTreeSet<&'a str> = BTreeSet::new();
    let mut stack: Vec<&'a str> = graph.dependents(id).into_iter().collect();
    while let Some(next) = stack.pop() {
        if seen.insert(next) {
            stack.extend(graph.dependents(next));
        }
    }
    seen
}

/// Ids whose record depends on `id`, directly or through other records
fn recorded_dependents<'a>(previous: &'a DeployedState, id: &str) -> BTreeSet<&'a str> {
    let mut seen: BTreeSet<&'a str> = BTreeSet::new();
    let mut stack: Vec<&'a str> = previous.dependents(id).into_iter().collect();
    while let Some(next) = stack.pop() {
        if seen.insert(next) {
            stack.extend(previous.dependents(next));
        }
    }
    seen
}

/// Delete undeclared records that depend on `id` before `id` itself goes
fn emit_dependent_orphan_deletes(
    graph: &ValidatedGraph,
    previous: &DeployedState,
    id: &str,
    plan: &mut Plan,
    delete_step: &mut HashMap<String, usize>,
) {
    let orphans: BTreeMap<String, BTreeSet<String>> = recorded_dependents(previous, id)
        .into_iter()
        .filter(|d| graph.get(d).is_none() && !delete_step.contains_key(*d))
        .filter_map(|d| previous.get(d).map(|r| (d.to_string(), r.depends_on.clone())))
        .collect();
    emit_orphan_batch(previous, &orphans, &HashMap::new(), plan, delete_step);
}

/// Delete recorded nodes that are no longer declared, dependents first
///
/// Orphans already deleted ahead of a replacement are skipped.
fn emit_orphan_deletes(
    graph: &ValidatedGraph,
    previous: &DeployedState,
    final_step: &HashMap<String, usize>,
    plan: &mut Plan,
    delete_step: &mut HashMap<String, usize>,
) {
    let orphans: BTreeMap<String, BTreeSet<String>> = previous
        .resources
        .iter()
        .filter(|(id, _)| graph.get(id).is_none() && !delete_step.contains_key(*id))
        .map(|(id, record)| (id.clone(), record.depends_on.clone()))
        .collect();
    emit_orphan_batch(previous, &orphans, final_step, plan, delete_step);
}

/// Each delete waits for whatever happens to the nodes that recorded a dependency on it
fn emit_orphan_batch(
    previous: &DeployedState,
    orphans: &BTreeMap<String, BTreeSet<String>>,
    final_step: &HashMap<String, usize>,
    plan: &mut Plan,
    delete_step: &mut HashMap<String, usize>,
) {
    for id in topological_order(orphans).into_iter().rev() {
        let Some(record) = previous.get(&id) else { continue };
        let after: BTreeSet<usize> = previous
            .dependents(&id)
            .into_iter()
            .filter_map(|d| final_step.get(d).or_else(|| delete_step.get(d)).copied())
            .collect();
        let index = plan.push(&id, StepSpec::of_record(record), Action::Delete, after);
        delete_step.insert(id, index);
    }
}

/// Delete every node of the graph, dependents first
pub fn teardown(graph: &ValidatedGraph) -> Plan {
    reverse_deletes(&graph.edges(), |id| graph.get(id).map(StepSpec::of_node))
}

/// Delete every recorded resource, dependents first
///
/// Used when no declarations are at hand (destroy from state alone).
pub fn teardown_state(previous: &DeployedState) -> Plan {
    reverse_deletes(&previous.edges(), |id| previous.get(id).map(StepSpec::of_record))
}

fn reverse_deletes<F>(edges: &BTreeMap<String, BTreeSet<String>>, lookup: F) -> Plan
where
    F: Fn(&str) -> Option<StepSpec>,
{
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, deps) in edges {
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(id.as_str());
        }
    }

    let mut plan = Plan::default();
    let mut delete_step: HashMap<String, usize> = HashMap::new();
    for id in topological_order(edges).into_iter().rev() {
        let Some(spec) = lookup(&id) else { continue };
        let after: BTreeSet<usize> = dependents
            .get(id.as_str())
            .into_iter()
            .flatten()
            .filter_map(|d| delete_step.get(*d).copied())
            .collect();
        let index = plan.push(&id, spec, Action::Delete, after);
        delete_step.insert(id, index);
    }
    plan
}
