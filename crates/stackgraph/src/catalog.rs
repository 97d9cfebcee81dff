//! Resource catalog - the kinds a graph may contain and their attribute schemas
//!
//! The catalog is the only place that knows which attributes a kind requires,
//! which attributes may hold references (and to what), and whether those
//! references order creation (structural) or are plain values (configuration).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kinds of resources in a web-tier deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    SecurityGroup,
    Role,
    LaunchTemplate,
    AutoScalingGroup,
    LoadBalancer,
    TargetGroup,
    Listener,
}

impl ResourceKind {
    /// All kinds, in declaration order
    pub const ALL: [ResourceKind; 7] = [
        Self::SecurityGroup,
        Self::Role,
        Self::LaunchTemplate,
        Self::AutoScalingGroup,
        Self::LoadBalancer,
        Self::TargetGroup,
        Self::Listener,
    ];

    /// Name used in stack files and plan output
    pub fn name(&self) -> &'static str {
        match self {
            Self::SecurityGroup => "SecurityGroup",
            Self::Role => "Role",
            Self::LaunchTemplate => "LaunchTemplate",
            Self::AutoScalingGroup => "AutoScalingGroup",
            Self::LoadBalancer => "LoadBalancer",
            Self::TargetGroup => "TargetGroup",
            Self::Listener => "Listener",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown resource kind: {s}"))
    }
}

/// Whether a reference orders creation or is only a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceMode {
    /// Target must exist before the referencing node is created
    Structural,
    /// Target is used as a value only; no ordering edge
    Configuration,
}

/// Reference rule for a single attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRule {
    pub mode: ReferenceMode,
    pub allowed: Vec<ResourceKind>,
}

impl ReferenceRule {
    pub fn is_structural(&self) -> bool {
        self.mode == ReferenceMode::Structural
    }

    pub fn allows(&self, kind: ResourceKind) -> bool {
        self.allowed.contains(&kind)
    }
}

/// Attribute schema of a resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSchema {
    pub kind: ResourceKind,
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub references: BTreeMap<String, ReferenceRule>,
    pub outputs: Vec<String>,
    /// Whether attribute changes can be applied without replacing the resource
    pub updatable: bool,
}

impl KindSchema {
    /// Start a schema with no attributes, no outputs, and in-place updates allowed
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            required: Vec::new(),
            optional: Vec::new(),
            references: BTreeMap::new(),
            outputs: Vec::new(),
            updatable: true,
        }
    }

    /// Add required scalar attributes
    pub fn required(mut self, names: &[&str]) -> Self {
        self.required.extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Add optional scalar attributes
    pub fn optional(mut self, names: &[&str]) -> Self {
        self.optional.extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Declare a structural reference attribute (optional unless also listed in `required`)
    pub fn structural(self, name: &str, allowed: &[ResourceKind]) -> Self {
        self.reference(name, ReferenceMode::Structural, allowed)
    }

    /// Declare a configuration reference attribute
    pub fn configuration(self, name: &str, allowed: &[ResourceKind]) -> Self {
        self.reference(name, ReferenceMode::Configuration, allowed)
    }

    fn reference(mut self, name: &str, mode: ReferenceMode, allowed: &[ResourceKind]) -> Self {
        if !self.is_known(name) {
            self.optional.push(name.to_string());
        }
        self.references.insert(
            name.to_string(),
            ReferenceRule {
                mode,
                allowed: allowed.to_vec(),
            },
        );
        self
    }

    /// Set the outputs this kind publishes once provisioned
    pub fn outputs(mut self, names: &[&str]) -> Self {
        self.outputs = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    /// Mark the kind as not supporting in-place updates
    pub fn replace_on_change(mut self) -> Self {
        self.updatable = false;
        self
    }

    /// Check if the attribute is part of the schema
    pub fn is_known(&self, name: &str) -> bool {
        self.required.iter().chain(self.optional.iter()).any(|a| a == name)
    }

    /// Reference rule for an attribute, if it accepts references
    pub fn reference_rule(&self, name: &str) -> Option<&ReferenceRule> {
        self.references.get(name)
    }

    /// Check if the kind publishes the named output
    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }
}

/// Registry of resource kinds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    kinds: BTreeMap<ResourceKind, KindSchema>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, replacing any existing schema for the same kind
    pub fn register(&mut self, schema: KindSchema) {
        self.kinds.insert(schema.kind, schema);
    }

    /// Builder-style variant of [`Catalog::register`]
    pub fn with(mut self, schema: KindSchema) -> Self {
        self.register(schema);
        self
    }

    /// Look up the schema of a kind
    pub fn get(&self, kind: ResourceKind) -> Option<&KindSchema> {
        self.kinds.get(&kind)
    }

    /// Iterate schemas in kind order
    pub fn schemas(&self) -> impl Iterator<Item = &KindSchema> {
        self.kinds.values()
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if no kinds are registered
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Whether a kind can be updated in place (unknown kinds cannot)
    pub fn is_updatable(&self, kind: ResourceKind) -> bool {
        self.get(kind).is_some_and(|s| s.updatable)
    }

    /// Catalog for the three-tier web deployment
    pub fn standard() -> Self {
        use ResourceKind::{
            AutoScalingGroup, LaunchTemplate, Listener, LoadBalancer, Role, SecurityGroup,
            TargetGroup,
        };

        Self::new()
            .with(
                KindSchema::new(SecurityGroup)
                    .required(&["vpcId"])
                    .optional(&["description", "ingressRules", "allowAllOutbound"])
                    .configuration("peerGroups", &[SecurityGroup])
                    .outputs(&["id"]),
            )
            .with(
                KindSchema::new(Role)
                    .required(&["assumedBy"])
                    .optional(&["managedPolicies", "description"])
                    .outputs(&["arn", "name"]),
            )
            .with(
                KindSchema::new(LaunchTemplate)
                    .required(&["machineImage", "instanceType"])
                    .optional(&["userData"])
                    .structural("securityGroup", &[SecurityGroup])
                    .structural("role", &[Role])
                    .outputs(&["id", "latestVersion"])
                    .replace_on_change(),
            )
            .with(
                KindSchema::new(AutoScalingGroup)
                    .required(&["vpcId", "launchTemplate"])
                    .optional(&["minCapacity", "maxCapacity", "desiredCapacity", "allowPort"])
                    .structural("launchTemplate", &[LaunchTemplate])
                    .structural("allowFrom", &[LoadBalancer])
                    .outputs(&["name", "arn"]),
            )
            .with(
                KindSchema::new(LoadBalancer)
                    .required(&["vpcId"])
                    .optional(&["internetFacing"])
                    .structural("securityGroup", &[SecurityGroup])
                    .outputs(&["arn", "dnsName"]),
            )
            .with(
                KindSchema::new(TargetGroup)
                    .required(&["port", "vpcId"])
                    .optional(&["protocol", "healthCheckPath", "healthCheckIntervalSecs"])
                    .structural("targets", &[AutoScalingGroup])
                    .outputs(&["arn"]),
            )
            .with(
                KindSchema::new(Listener)
                    .required(&["loadBalancer", "port"])
                    .optional(&["protocol"])
                    .structural("loadBalancer", &[LoadBalancer])
                    .structural("target", &[AutoScalingGroup, TargetGroup])
                    .outputs(&["arn"]),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_has_every_kind() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.len(), ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            let schema = catalog.get(kind).unwrap();
            assert!(!schema.outputs.is_empty(), "{kind} publishes no outputs");
        }
    }

    #[test]
    fn test_reference_attribute_is_known_once() {
        let schema = KindSchema::new(ResourceKind::Listener)
            .required(&["loadBalancer"])
            .structural("loadBalancer", &[ResourceKind::LoadBalancer]);

        assert_eq!(schema.required, vec!["loadBalancer".to_string()]);
        assert!(schema.optional.is_empty());
        assert!(schema.reference_rule("loadBalancer").unwrap().is_structural());
    }

    #[test]
    fn test_peer_groups_are_configuration() {
        let catalog = Catalog::standard();
        let rule = catalog
            .get(ResourceKind::SecurityGroup)
            .and_then(|s| s.reference_rule("peerGroups"))
            .unwrap();
        assert_eq!(rule.mode, ReferenceMode::Configuration);
        assert!(rule.allows(ResourceKind::SecurityGroup));
    }

    #[test]
    fn test_launch_template_replaces_on_change() {
        let catalog = Catalog::standard();
        assert!(!catalog.is_updatable(ResourceKind::LaunchTemplate));
        assert!(catalog.is_updatable(ResourceKind::AutoScalingGroup));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "AutoScalingGroup".parse::<ResourceKind>(),
            Ok(ResourceKind::AutoScalingGroup)
        );
        assert_eq!("listener".parse::<ResourceKind>(), Ok(ResourceKind::Listener));
        assert!("Bucket".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_register_replaces_schema() {
        let mut catalog = Catalog::standard();
        catalog.register(KindSchema::new(ResourceKind::Role).required(&["assumedBy"]));
        assert!(catalog.get(ResourceKind::Role).unwrap().outputs.is_empty());
        assert_eq!(catalog.len(), ResourceKind::ALL.len());
    }
}
