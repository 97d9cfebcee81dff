use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackgraph::DeployedState;
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted deployment state
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct StateFile {
    /// Last time an apply or destroy recorded changes
    pub last_applied: Option<DateTime<Utc>>,

    /// Every provisioned resource, keyed by node id
    #[serde(default)]
    pub deployed: DeployedState,
}

impl StateFile {
    /// Get the state directory path (~/.local/state/webtier)
    pub fn state_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".local").join("state").join("webtier"))
    }

    /// Get the default state file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::state_dir()?.join("state.toml"))
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, starting from empty state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: StateFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!(
            "Loaded {} resource(s) from {}",
            state.deployed.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Replace the recorded resources and stamp the time
    pub fn record(&mut self, deployed: DeployedState) {
        self.deployed = deployed;
        self.last_applied = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgraph::{AttributeValue, Attributes, Outputs, ResourceKind, ResourceRecord};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn sample() -> DeployedState {
        let mut deployed = DeployedState::new();
        let mut attributes = Attributes::new();
        attributes.insert("vpcId".into(), AttributeValue::string("vpc-1"));
        deployed.insert(
            "sg1",
            ResourceRecord {
                kind: ResourceKind::SecurityGroup,
                depends_on: BTreeSet::new(),
                resolved: attributes.clone(),
                attributes,
                outputs: Outputs::from([("id".to_string(), "sg-0abc".to_string())]),
            },
        );
        deployed
    }

    #[test]
    fn test_load_missing_returns_default() {
        let dir = TempDir::new().unwrap();
        let state = StateFile::load(&dir.path().join("state.toml")).unwrap();
        assert!(state.deployed.is_empty());
        assert!(state.last_applied.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut state = StateFile::default();
        state.record(sample());
        state.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.deployed.output(&stackgraph::Reference::new("sg1", "id")), Some("sg-0abc"));
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "deployed = 3").unwrap();

        assert!(StateFile::load(&path).is_err());
    }
}
