//! Apply engine boundary
//!
//! The core never talks to a provider. It hands each step, with references
//! replaced by live outputs, to an [`ApplyEngine`] and records what comes back.

use crate::catalog::ResourceKind;
use crate::error::ApplyError;
use crate::planner::{Action, PlanStep};
use crate::types::{Attributes, Outputs, Reference};

/// A plan step with its references resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub index: usize,
    /// Stable identifier; safe to use as an idempotency key
    pub node_id: String,
    pub kind: ResourceKind,
    pub action: Action,
    /// Attributes with references replaced by live outputs
    ///
    /// A configuration reference whose target has no output yet (a group
    /// naming itself as a peer) is left as a reference for the engine to defer.
    pub attributes: Attributes,
    /// Outputs recorded for the live resource (empty for creates)
    pub previous_outputs: Outputs,
}

impl ResolvedStep {
    /// Resolve a step using `lookup` for reference values
    pub fn resolve<F>(step: &PlanStep, previous_outputs: Outputs, lookup: F) -> Self
    where
        F: Fn(&Reference) -> Option<String>,
    {
        let attributes = step
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.resolve(&lookup)))
            .collect();

        Self {
            index: step.index,
            node_id: step.node_id.clone(),
            kind: step.kind,
            action: step.action,
            attributes,
            previous_outputs,
        }
    }

    /// References that could not be resolved
    pub fn unresolved(&self) -> Vec<&Reference> {
        self.attributes.values().flat_map(|v| v.references()).collect()
    }
}

/// Executes plan steps against a provider
///
/// Implementations must be safe to call from several worker threads at once.
/// Retrying is the engine's business (see [`crate::retry::RetryingEngine`]).
pub trait ApplyEngine: Send + Sync {
    /// Create or update a resource, returning its outputs
    fn apply(&self, step: &ResolvedStep) -> Result<Outputs, ApplyError>;

    /// Delete a resource
    fn teardown(&self, step: &ResolvedStep) -> Result<(), ApplyError>;
}

impl<E: ApplyEngine + ?Sized> ApplyEngine for Box<E> {
    fn apply(&self, step: &ResolvedStep) -> Result<Outputs, ApplyError> {
        (**self).apply(step)
    }

    fn teardown(&self, step: &ResolvedStep) -> Result<(), ApplyError> {
        (**self).teardown(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeValue;
    use std::collections::BTreeSet;

    #[test]
    fn test_resolve_step() {
        let mut attributes = Attributes::new();
        attributes.insert("launchTemplate".into(), AttributeValue::reference("lt1", "id"));
        attributes.insert("allowFrom".into(), AttributeValue::reference("alb1", "arn"));
        attributes.insert("vpcId".into(), AttributeValue::string("vpc-1"));
        let step = PlanStep {
            index: 3,
            node_id: "asg1".into(),
            kind: ResourceKind::AutoScalingGroup,
            action: Action::Create,
            attributes,
            depends_on: BTreeSet::new(),
            after: vec![],
        };

        let resolved = ResolvedStep::resolve(&step, Outputs::new(), |r| {
            (r.target == "lt1").then(|| "lt-0abc".to_string())
        });

        assert_eq!(resolved.attributes["launchTemplate"], AttributeValue::string("lt-0abc"));
        assert_eq!(resolved.attributes["vpcId"], AttributeValue::string("vpc-1"));
        assert_eq!(resolved.unresolved(), vec![&Reference::new("alb1", "arn")]);
    }
}
