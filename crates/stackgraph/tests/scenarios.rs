//! End-to-end scenarios over the public API: declare, validate, plan, apply, re-plan

use stackgraph::{
    Action, ApplyEngine, ApplyError, AttributeValue, Catalog, Declaration, DeployedState, Error,
    ExecuteOptions, Graph, KindSchema, NoProgress, Outputs, Plan, ResolvedStep, ResourceKind,
    StepStatus, ValidatedGraph, ValidationError, execute, plan, teardown_state, validate,
};
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Engine that mints `<id>-<output>` values and remembers what it was asked to do
#[derive(Default)]
struct RecordingEngine {
    fail: BTreeSet<String>,
    calls: Mutex<Vec<(String, Action)>>,
}

impl RecordingEngine {
    fn calls(&self) -> Vec<(String, Action)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ApplyEngine for RecordingEngine {
    fn apply(&self, step: &ResolvedStep) -> Result<Outputs, ApplyError> {
        self.calls.lock().unwrap().push((step.node_id.clone(), step.action));
        if self.fail.contains(&step.node_id) {
            return Err(ApplyError::Timeout {
                message: "request expired".into(),
            });
        }
        let schema = Catalog::standard().get(step.kind).cloned().unwrap();
        Ok(schema
            .outputs
            .iter()
            .map(|o| (o.clone(), format!("{}-{o}", step.node_id)))
            .collect())
    }

    fn teardown(&self, step: &ResolvedStep) -> Result<(), ApplyError> {
        self.calls.lock().unwrap().push((step.node_id.clone(), step.action));
        Ok(())
    }
}

fn web_tier(user_data: &str) -> Vec<Declaration> {
    vec![
        Declaration::new("l1", ResourceKind::Listener)
            .attr("port", 80)
            .reference("loadBalancer", "alb1", "arn")
            .reference("target", "asg1", "name"),
        Declaration::new("asg1", ResourceKind::AutoScalingGroup)
            .attr("vpcId", "vpc-1")
            .attr("allowPort", 80)
            .reference("launchTemplate", "lt1", "id")
            .reference("allowFrom", "alb1", "arn"),
        Declaration::new("lt1", ResourceKind::LaunchTemplate)
            .attr("machineImage", "ami-1")
            .attr("instanceType", "t2.micro")
            .attr("userData", user_data)
            .reference("securityGroup", "sg1", "id")
            .reference("role", "role1", "arn"),
        Declaration::new("role1", ResourceKind::Role).attr("assumedBy", "ec2.amazonaws.com"),
        Declaration::new("sg1", ResourceKind::SecurityGroup)
            .attr("vpcId", "vpc-1")
            .attr("ingressRules", AttributeValue::List(vec!["tcp:22".into(), "tcp:80".into()])),
        Declaration::new("alb1", ResourceKind::LoadBalancer)
            .attr("vpcId", "vpc-1")
            .attr("internetFacing", true),
    ]
}

fn validated(decls: Vec<Declaration>) -> ValidatedGraph {
    validate(Graph::from_declarations(decls).unwrap(), &Catalog::standard()).unwrap()
}

fn apply(plan: &Plan, state: &DeployedState, engine: &RecordingEngine) -> DeployedState {
    let report = execute(plan, state, engine, &ExecuteOptions::default(), &mut NoProgress).unwrap();
    report.state_after(plan, state)
}

fn at(plan: &Plan, id: &str, action: Action) -> usize {
    plan.steps
        .iter()
        .position(|s| s.node_id == id && s.action == action)
        .unwrap()
}

#[test]
fn create_order_follows_references() {
    let plan = plan(&validated(web_tier("#!/bin/sh")), &DeployedState::new());

    assert!(at(&plan, "sg1", Action::Create) < at(&plan, "lt1", Action::Create));
    assert!(at(&plan, "role1", Action::Create) < at(&plan, "lt1", Action::Create));
    assert!(at(&plan, "lt1", Action::Create) < at(&plan, "asg1", Action::Create));
    assert!(at(&plan, "alb1", Action::Create) < at(&plan, "asg1", Action::Create));
    assert_eq!(plan.steps.last().unwrap().node_id, "l1");
}

#[test]
fn unknown_target_yields_exactly_one_error_and_no_plan() {
    let mut decls = web_tier("#!/bin/sh");
    decls.push(
        Declaration::new("l2", ResourceKind::Listener)
            .attr("port", 8080)
            .attr("loadBalancer", AttributeValue::reference("alb1", "arn"))
            .attr("target", AttributeValue::reference("asg-nonexistent", "name")),
    );
    let graph = Graph::from_declarations(decls).unwrap();

    let errors = validate(graph, &Catalog::standard()).unwrap_err();

    assert_eq!(
        errors,
        vec![ValidationError::UnknownId {
            node: "l2".into(),
            attribute: "target".into(),
            target: "asg-nonexistent".into(),
        }]
    );
}

#[test]
fn unknown_target_rejected_while_building() {
    let mut decls = web_tier("#!/bin/sh");
    decls.push(
        Declaration::new("l2", ResourceKind::Listener)
            .attr("port", 8080)
            .reference("target", "asg-nonexistent", "name"),
    );

    let err = Graph::from_declarations(decls).unwrap_err();
    assert!(matches!(err, Error::UnknownId { id } if id == "asg-nonexistent"));
}

#[test]
fn duplicate_id_aborts_build() {
    let mut decls = web_tier("#!/bin/sh");
    decls.push(Declaration::new("sg1", ResourceKind::SecurityGroup).attr("vpcId", "vpc-2"));

    let err = Graph::from_declarations(decls).unwrap_err();
    assert!(matches!(err, Error::DuplicateId { id } if id == "sg1"));
}

#[test]
fn validation_errors_are_collected() {
    let graph = Graph::from_declarations(vec![
        Declaration::new("sg1", ResourceKind::SecurityGroup),
        Declaration::new("l1", ResourceKind::Listener)
            .attr("port", 80)
            .reference("loadBalancer", "sg1", "id"),
    ])
    .unwrap();

    let errors = validate(graph, &Catalog::standard()).unwrap_err();

    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingAttribute { node, .. } if node == "sg1")));
    assert!(errors.iter().any(|e| matches!(e, ValidationError::TypeMismatch { node, .. } if node == "l1")));
}

#[test]
fn cycle_is_reported_with_its_path() {
    // a catalog where fleets can also point at each other
    let mut catalog = Catalog::standard();
    catalog.register(
        KindSchema::new(ResourceKind::AutoScalingGroup)
            .required(&["vpcId"])
            .structural("follows", &[ResourceKind::AutoScalingGroup])
            .outputs(&["name", "arn"]),
    );
    let graph = Graph::from_declarations(vec![
        Declaration::new("asg-a", ResourceKind::AutoScalingGroup)
            .attr("vpcId", "vpc-1")
            .reference("follows", "asg-b", "name"),
        Declaration::new("asg-b", ResourceKind::AutoScalingGroup)
            .attr("vpcId", "vpc-1")
            .reference("follows", "asg-a", "name"),
        Declaration::new("sg1", ResourceKind::SecurityGroup).attr("vpcId", "vpc-1"),
    ])
    .unwrap();

    let errors = validate(graph, &catalog).unwrap_err();

    assert_eq!(
        errors,
        vec![ValidationError::CycleDetected {
            path: vec!["asg-a".into(), "asg-b".into(), "asg-a".into()],
        }]
    );
}

#[test]
fn bootstrap_change_replaces_template_and_reapply_is_noop() {
    let engine = RecordingEngine::default();
    let first = validated(web_tier("#!/bin/sh\necho v1"));
    let initial = plan(&first, &DeployedState::new());
    let state = apply(&initial, &DeployedState::new(), &engine);
    assert_eq!(state.len(), 6);

    let unchanged = plan(&first, &state);
    assert!(unchanged.is_noop());

    let second = validated(web_tier("#!/bin/sh\necho v2"));
    let replace = plan(&second, &state);
    let delete = at(&replace, "lt1", Action::Delete);
    assert_eq!(at(&replace, "lt1", Action::Create), delete + 1);
    assert_eq!(replace.summary().update, 1);
    assert!(at(&replace, "asg1", Action::Update) > delete + 1);

    let state = apply(&replace, &state, &engine);
    assert!(plan(&second, &state).is_noop());
}

#[test]
fn plan_json_is_stable() {
    let graph = validated(web_tier("#!/bin/sh"));
    let first = plan(&graph, &DeployedState::new()).to_json().unwrap();
    let again = plan(&validated(web_tier("#!/bin/sh")), &DeployedState::new())
        .to_json()
        .unwrap();

    assert_eq!(first, again);
    let parsed: Plan = serde_json::from_str(&first).unwrap();
    assert_eq!(parsed.len(), 6);
    assert!(first.contains("\"action\": \"create\""));
}

#[test]
fn partial_failure_then_resume() {
    let graph = validated(web_tier("#!/bin/sh"));
    let initial = plan(&graph, &DeployedState::new());
    let engine = RecordingEngine {
        fail: BTreeSet::from(["role1".to_string()]),
        ..Default::default()
    };

    let report = execute(&initial, &DeployedState::new(), &engine, &ExecuteOptions::default(), &mut NoProgress)
        .unwrap();
    let blocked: Vec<&str> = report
        .steps
        .iter()
        .filter(|r| matches!(&r.status, StepStatus::Blocked { by } if by == "role1"))
        .map(|r| r.node_id.as_str())
        .collect();
    assert_eq!(blocked, vec!["lt1", "asg1", "l1"]);
    assert_eq!(report.summary.created, 2);

    let state = report.state_after(&initial, &DeployedState::new());
    let resume = plan(&graph, &state);
    assert_eq!(resume.summary().create, 4);
    assert_eq!(resume.summary().noop, 2);
}

#[test]
fn state_survives_toml_and_tears_down_in_reverse() {
    let engine = RecordingEngine::default();
    let graph = validated(web_tier("#!/bin/sh"));
    let initial = plan(&graph, &DeployedState::new());
    let state = apply(&initial, &DeployedState::new(), &engine);

    let text = toml::to_string_pretty(&state).unwrap();
    let reloaded: DeployedState = toml::from_str(&text).unwrap();
    assert_eq!(reloaded, state);
    assert!(plan(&graph, &reloaded).is_noop());

    let teardown = teardown_state(&reloaded);
    let mut expected = initial.node_order();
    expected.reverse();
    assert_eq!(teardown.node_order(), expected);

    let engine = RecordingEngine::default();
    let after = apply(&teardown, &reloaded, &engine);
    assert!(after.is_empty());
    assert_eq!(engine.calls().len(), 6);
}
