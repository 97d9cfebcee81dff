//! # Stackgraph
//!
//! Declarative resource graphs for cloud deployments.
//!
//! Resources are declared as typed nodes whose attributes may reference the
//! outputs of other nodes. References are the only way to express a
//! dependency: the crate infers create and delete ordering from them, plans
//! the minimum set of changes against what was deployed last time, and hands
//! each step to an external apply engine.
//!
//! ## Core Concepts
//!
//! - **Catalog**: the resource kinds, their attributes and allowed references
//! - **Graph**: declared nodes, keyed by id
//! - **ValidatedGraph**: a graph whose references, kinds and ordering are sound
//! - **Plan**: an ordered, serializable sequence of create/update/no-op/delete steps
//! - **Executor**: dispatches steps to an [`ApplyEngine`] with bounded parallelism
//!
//! ## Example
//!
//! ```ignore
//! use stackgraph::{
//!     Catalog, Declaration, DeployedState, ExecuteOptions, Graph, NoProgress,
//!     ResourceKind, execute, plan, validate,
//! };
//!
//! let graph = Graph::from_declarations(vec![
//!     Declaration::new("sg1", ResourceKind::SecurityGroup).attr("vpcId", "vpc-1"),
//!     Declaration::new("lt1", ResourceKind::LaunchTemplate)
//!         .attr("machineImage", "ami-1")
//!         .attr("instanceType", "t2.micro")
//!         .reference("securityGroup", "sg1", "id"),
//! ])?;
//! let graph = validate(graph, &Catalog::standard()).map_err(stackgraph::Error::Validation)?;
//!
//! let previous = DeployedState::new();
//! let plan = plan(&graph, &previous);
//! println!("{}", plan.to_json()?);
//!
//! let report = execute(&plan, &previous, &my_engine, &ExecuteOptions::default(), &mut NoProgress)?;
//! let next = report.state_after(&plan, &previous);
//! ```
//!
//! ## Engine Traits
//!
//! - [`ApplyEngine`]: performs provider calls for one step
//! - [`RetryCallback`]: observes retries made by [`RetryingEngine`]
//! - [`ProgressCallback`]: receives progress updates from the executor
//!
//! The core has no provider, terminal or filesystem dependencies; those live
//! behind these traits.

pub mod catalog;
pub mod context;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod graph;
pub mod planner;
pub mod resource;
pub mod retry;
pub mod state;
pub mod types;
pub mod validator;

// Re-export main types at crate root
pub use catalog::{Catalog, KindSchema, ReferenceMode, ReferenceRule, ResourceKind};
pub use context::{LogProgress, NoProgress, ProgressCallback};
pub use diff::{AttributeChange, Change, attribute_changes, classify};
pub use engine::{ApplyEngine, ResolvedStep};
pub use error::{ApplyError, Error, ErrorCategory, Result, StepFailure, ValidationError};
pub use executor::{ExecutionReport, StepReport, StepStatus, execute};
pub use graph::Graph;
pub use planner::{Action, Plan, PlanStep, PlanSummary, plan, teardown, teardown_state, topological_order};
pub use resource::{Declaration, DeclaredReference, ResourceNode};
pub use retry::{LogCallback, NoCallback, RetryCallback, RetryConfig, RetryingEngine, with_retry};
pub use state::{DeployedState, ResourceRecord};
pub use types::{AttributeValue, Attributes, ExecuteOptions, ExecuteSummary, Outputs, Reference, Scalar};
pub use validator::{ValidatedGraph, validate};
