//! Simulated cloud provider
//!
//! Stands in for real provider calls so stacks can be planned, applied and
//! torn down end to end. Identifiers are derived from the node id and its
//! resolved attributes, so the same request always yields the same outputs.

use crate::config::ProviderSettings;
use stackgraph::{
    Action, ApplyEngine, ApplyError, Catalog, Outputs, Reference, ResolvedStep, ResourceKind,
};
use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

/// Account id used in minted ARNs
const ACCOUNT: &str = "000000000000";

pub struct SimulatedProvider {
    region: String,
    latency: Duration,
    fail_nodes: BTreeSet<String>,
    catalog: Catalog,
}

impl SimulatedProvider {
    pub fn new(settings: &ProviderSettings) -> Self {
        Self {
            region: settings.region.clone(),
            latency: Duration::from_millis(settings.latency_ms),
            fail_nodes: settings.fail_nodes.clone(),
            catalog: Catalog::standard(),
        }
    }

    /// First reference the provider cannot go without
    ///
    /// Configuration references (peer groups) may still be symbolic when
    /// their target is created later in the same run; the rule is attached
    /// once the peer exists.
    fn missing_dependency<'a>(&self, step: &'a ResolvedStep) -> Option<&'a Reference> {
        let schema = self.catalog.get(step.kind);
        step.attributes
            .iter()
            .filter(|(name, _)| {
                schema
                    .and_then(|s| s.reference_rule(name))
                    .is_none_or(|rule| rule.is_structural())
            })
            .flat_map(|(_, value)| value.references())
            .find(|r| r.target != step.node_id)
    }

    fn call(&self, step: &ResolvedStep) -> Result<(), ApplyError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        if self.fail_nodes.contains(&step.node_id) {
            return Err(ApplyError::ProviderRejected {
                message: format!("{} request for '{}' was refused", step.kind, step.node_id),
            });
        }
        Ok(())
    }

    /// Outputs for a freshly created resource
    fn mint(&self, step: &ResolvedStep) -> Outputs {
        let digest = fingerprint(step);
        let short = &digest[..8];
        let name = format!("{}-{short}", step.node_id);
        let region = &self.region;

        let pairs: Vec<(&str, String)> = match step.kind {
            ResourceKind::SecurityGroup => vec![("id", format!("sg-{}", &digest[..17]))],
            ResourceKind::Role => vec![
                ("arn", format!("arn:aws:iam::{ACCOUNT}:role/{name}")),
                ("name", name),
            ],
            ResourceKind::LaunchTemplate => vec![
                ("id", format!("lt-{}", &digest[..17])),
                ("latestVersion", "1".to_string()),
            ],
            ResourceKind::AutoScalingGroup => vec![
                (
                    "arn",
                    format!(
                        "arn:aws:autoscaling:{region}:{ACCOUNT}:autoScalingGroup:{}:autoScalingGroupName/{name}",
                        &digest[..32]
                    ),
                ),
                ("name", name),
            ],
            ResourceKind::LoadBalancer => vec![
                (
                    "arn",
                    format!(
                        "arn:aws:elasticloadbalancing:{region}:{ACCOUNT}:loadbalancer/app/{}/{}",
                        step.node_id,
                        &digest[..16]
                    ),
                ),
                ("dnsName", format!("{name}.{region}.elb.amazonaws.com")),
            ],
            ResourceKind::TargetGroup => vec![(
                "arn",
                format!(
                    "arn:aws:elasticloadbalancing:{region}:{ACCOUNT}:targetgroup/{}/{}",
                    step.node_id,
                    &digest[..16]
                ),
            )],
            ResourceKind::Listener => vec![(
                "arn",
                format!(
                    "arn:aws:elasticloadbalancing:{region}:{ACCOUNT}:listener/app/{}/{}",
                    step.node_id,
                    &digest[..16]
                ),
            )],
        };

        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

impl ApplyEngine for SimulatedProvider {
    fn apply(&self, step: &ResolvedStep) -> Result<Outputs, ApplyError> {
        self.call(step)?;

        if let Some(unresolved) = self.missing_dependency(step) {
            return Err(ApplyError::ProviderRejected {
                message: format!("'{}' has no value for {unresolved}", step.node_id),
            });
        }

        let outputs = match step.action {
            // identity survives an in-place update
            Action::Update if !step.previous_outputs.is_empty() => step.previous_outputs.clone(),
            _ => self.mint(step),
        };
        log::debug!("{} {} '{}': {:?}", step.action, step.kind, step.node_id, outputs);
        Ok(outputs)
    }

    fn teardown(&self, step: &ResolvedStep) -> Result<(), ApplyError> {
        self.call(step)?;
        log::debug!("delete {} '{}'", step.kind, step.node_id);
        Ok(())
    }
}

/// Hex digest over the node id and its resolved attributes
fn fingerprint(step: &ResolvedStep) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(step.node_id.as_bytes());
    hasher.update(&[0]);
    for (name, value) in &step.attributes {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        hasher.update(value.to_string().as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}
