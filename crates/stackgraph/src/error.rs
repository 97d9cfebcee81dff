//! Error types for graph building, validation, and application.
//!
//! Build errors are fatal before validation. Validation errors are collected
//! and returned as a batch. Apply errors are per step and never abort
//! unrelated branches of the graph.

use crate::catalog::ResourceKind;
use crate::planner::Action;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by the graph builder and the planning pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Two declarations share an id
    #[error("duplicate resource id: {id}")]
    DuplicateId { id: String },

    /// A reference names an id that has not been declared
    #[error("unknown resource id: {id}")]
    UnknownId { id: String },

    /// The graph failed validation
    #[error("{}", ValidationErrors(.0))]
    Validation(Vec<ValidationError>),

    /// Worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    ThreadPool(String),

    /// Plan or state could not be serialized
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for stackgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single problem found by the validator
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("{node}: kind {kind} is not in the catalog")]
    UnknownKind { node: String, kind: ResourceKind },

    #[error("{node}: missing required attribute '{attribute}' for {kind}")]
    MissingAttribute {
        node: String,
        kind: ResourceKind,
        attribute: String,
    },

    #[error("{node}: attribute '{attribute}' is not defined for {kind}")]
    UnknownAttribute {
        node: String,
        kind: ResourceKind,
        attribute: String,
    },

    #[error("{node}.{attribute}: unknown resource id '{target}'")]
    UnknownId {
        node: String,
        attribute: String,
        target: String,
    },

    #[error("{node}.{attribute}: '{target}' is a {found}, expected one of [{}]", kind_list(.expected))]
    TypeMismatch {
        node: String,
        attribute: String,
        target: String,
        expected: Vec<ResourceKind>,
        found: ResourceKind,
    },

    #[error("{node}.{attribute}: '{target}' has no output '{output}'")]
    UnknownOutput {
        node: String,
        attribute: String,
        target: String,
        output: String,
    },

    #[error("reference cycle: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },
}

impl ValidationError {
    /// Node the error is reported against (first node of the path for cycles)
    pub fn node(&self) -> &str {
        match self {
            Self::UnknownKind { node, .. }
            | Self::MissingAttribute { node, .. }
            | Self::UnknownAttribute { node, .. }
            | Self::UnknownId { node, .. }
            | Self::TypeMismatch { node, .. }
            | Self::UnknownOutput { node, .. } => node,
            Self::CycleDetected { path } => path.first().map_or("", String::as_str),
        }
    }
}

fn kind_list(kinds: &[ResourceKind]) -> String {
    kinds
        .iter()
        .map(ResourceKind::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Display adapter joining a batch of validation errors
struct ValidationErrors<'a>(&'a [ValidationError]);

impl fmt::Display for ValidationErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for err in self.0 {
            write!(f, "\n  - {err}")?;
        }
        Ok(())
    }
}

/// Categories of provider errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Provider refused the request (bad input, quota, conflict)
    Rejected,
    /// Provider did not answer in time (transient, retryable)
    Timeout,
    /// Credentials lack the required permission
    Permission,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Error returned by an apply engine for a single step
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplyError {
    #[error("provider rejected request: {message}")]
    ProviderRejected { message: String },

    #[error("timed out: {message}")]
    Timeout { message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },
}

impl ApplyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderRejected { .. } => ErrorCategory::Rejected,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::PermissionDenied { .. } => ErrorCategory::Permission,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// A failed step with enough context to resume or roll back by hand
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{action} {kind} '{node_id}' failed: {source}")]
pub struct StepFailure {
    pub node_id: String,
    pub kind: ResourceKind,
    pub action: Action,
    #[source]
    pub source: ApplyError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(!ErrorCategory::Rejected.is_retryable());
        assert!(!ErrorCategory::Permission.is_retryable());
    }

    #[test]
    fn test_validation_batch_display() {
        let err = Error::Validation(vec![
            ValidationError::UnknownId {
                node: "l2".into(),
                attribute: "target".into(),
                target: "asg-nonexistent".into(),
            },
            ValidationError::CycleDetected {
                path: vec!["a".into(), "b".into(), "a".into()],
            },
        ]);

        let text = err.to_string();
        assert!(text.starts_with("2 validation error(s)"));
        assert!(text.contains("l2.target: unknown resource id 'asg-nonexistent'"));
        assert!(text.contains("reference cycle: a -> b -> a"));
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = ValidationError::TypeMismatch {
            node: "l1".into(),
            attribute: "target".into(),
            target: "sg1".into(),
            expected: vec![ResourceKind::AutoScalingGroup, ResourceKind::TargetGroup],
            found: ResourceKind::SecurityGroup,
        };
        assert_eq!(
            err.to_string(),
            "l1.target: 'sg1' is a SecurityGroup, expected one of [AutoScalingGroup, TargetGroup]"
        );
    }

    #[test]
    fn test_step_failure_display() {
        let failure = StepFailure {
            node_id: "asg1".into(),
            kind: ResourceKind::AutoScalingGroup,
            action: Action::Create,
            source: ApplyError::PermissionDenied {
                message: "autoscaling:CreateAutoScalingGroup".into(),
            },
        };
        assert_eq!(
            failure.to_string(),
            "create AutoScalingGroup 'asg1' failed: permission denied: autoscaling:CreateAutoScalingGroup"
        );
    }
}
