//! Core types for declarative resource graphs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attributes of a node, ordered by name so plans serialize deterministically
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Output values published by a provisioned resource (e.g. `id` -> `sg-0a1b`)
pub type Outputs = BTreeMap<String, String>;

/// A literal attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// Pointer from one node's attribute to another node's output
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    /// Id of the referenced node
    #[serde(rename = "ref")]
    pub target: String,
    /// Output of the referenced node (e.g. "id", "arn")
    pub output: String,
}

impl Reference {
    pub fn new(target: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            output: output.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.target, self.output)
    }
}

/// Value of a single attribute
///
/// In stack files a reference is written inline as
/// `{ ref = "sg1", output = "id" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Reference(Reference),
    List(Vec<AttributeValue>),
    Scalar(Scalar),
}

impl AttributeValue {
    /// Shorthand for a string scalar
    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::String(value.into()))
    }

    /// Shorthand for an integer scalar
    pub fn integer(value: i64) -> Self {
        Self::Scalar(Scalar::Integer(value))
    }

    /// Shorthand for a boolean scalar
    pub fn boolean(value: bool) -> Self {
        Self::Scalar(Scalar::Boolean(value))
    }

    /// Shorthand for a reference
    pub fn reference(target: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Reference(Reference::new(target, output))
    }

    /// All references contained in this value, including those nested in lists
    pub fn references(&self) -> Vec<&Reference> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a Reference>) {
        match self {
            Self::Reference(r) => refs.push(r),
            Self::List(items) => {
                for item in items {
                    item.collect_references(refs);
                }
            }
            Self::Scalar(_) => {}
        }
    }

    /// Replace references using `lookup`, leaving unresolvable ones in place
    pub fn resolve<F>(&self, lookup: &F) -> Self
    where
        F: Fn(&Reference) -> Option<String>,
    {
        match self {
            Self::Reference(r) => match lookup(r) {
                Some(value) => Self::string(value),
                None => self.clone(),
            },
            Self::List(items) => Self::List(items.iter().map(|i| i.resolve(lookup)).collect()),
            Self::Scalar(_) => self.clone(),
        }
    }

    /// Get the string content if this is a string scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(r) => write!(f, "{r}"),
            Self::Scalar(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::integer(i64::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::boolean(value)
    }
}

impl From<Reference> for AttributeValue {
    fn from(value: Reference) -> Self {
        Self::Reference(value)
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub blocked: usize,
    pub skipped: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Check if execution was fully successful (no failures, nothing blocked)
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.blocked == 0
    }

    /// Total number of steps processed
    pub fn total(&self) -> usize {
        self.created
            + self.updated
            + self.deleted
            + self.unchanged
            + self.failed
            + self.blocked
            + self.skipped
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't call the engine, just report what would happen
    pub dry_run: bool,
    /// Maximum number of steps dispatched to the engine at once
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}
