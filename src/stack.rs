//! Stack files - TOML declarations of the resources to provision

use anyhow::{Context, Result};
use serde::Deserialize;
use stackgraph::{AttributeValue, Catalog, Declaration, Graph, ResourceKind, ValidatedGraph};
use std::fs;
use std::path::{Path, PathBuf};

/// Stack shipped with the binary
const BUILTIN: &str = include_str!("../stacks/webtier.toml");

/// A parsed stack file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stack {
    #[serde(default = "default_name")]
    pub name: String,

    /// Bootstrap payload for launch templates that declare none
    #[serde(default)]
    pub user_data_file: Option<String>,

    #[serde(default, rename = "resource")]
    pub resources: Vec<Declaration>,
}

fn default_name() -> String {
    "stack".to_string()
}

impl Stack {
    /// Parse a stack; `base` anchors relative `user_data_file` paths
    pub fn parse(content: &str, base: Option<&Path>) -> Result<Self> {
        let mut stack: Stack = toml::from_str(content).context("Invalid stack file")?;
        stack.load_user_data(base)?;
        Ok(stack)
    }

    /// The built-in web tier stack
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN, None).context("Built-in stack is invalid")
    }

    /// Load a stack from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read stack file: {}", path.display()))?;
        let stack = Self::parse(&content, path.parent())
            .with_context(|| format!("Failed to load stack file: {}", path.display()))?;
        log::debug!(
            "Loaded stack '{}' ({} resources) from {}",
            stack.name,
            stack.resources.len(),
            path.display()
        );
        Ok(stack)
    }

    /// Load `path` if given, the built-in stack otherwise
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    fn load_user_data(&mut self, base: Option<&Path>) -> Result<()> {
        let Some(file) = &self.user_data_file else {
            return Ok(());
        };

        let expanded = PathBuf::from(shellexpand::tilde(file).as_ref());
        let path = match base {
            Some(dir) if expanded.is_relative() => dir.join(expanded),
            _ => expanded,
        };
        let payload = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read user data file: {}", path.display()))?;

        for decl in &mut self.resources {
            if decl.kind == ResourceKind::LaunchTemplate && !decl.attributes.contains_key("userData") {
                decl.attributes
                    .insert("userData".to_string(), AttributeValue::string(payload.clone()));
            }
        }
        Ok(())
    }

    /// Build and validate the graph
    ///
    /// Validation errors come back as one [`stackgraph::Error::Validation`].
    pub fn validate(&self, catalog: &Catalog) -> Result<ValidatedGraph> {
        let graph = self.graph()?;
        let validated =
            stackgraph::validate(graph, catalog).map_err(stackgraph::Error::Validation)?;
        Ok(validated)
    }

    /// Build the unvalidated graph
    pub fn graph(&self) -> Result<Graph> {
        Graph::from_declarations(self.resources.iter().cloned())
            .with_context(|| format!("Failed to build graph for stack '{}'", self.name))
    }
}
