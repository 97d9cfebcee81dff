//! User settings (~/.config/webtier/config.toml)

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use stackgraph::RetryConfig;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("webtier"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parallel provider calls
    pub jobs: usize,
    /// State file location (`~` expanded)
    pub state_file: Option<String>,
    pub retry: RetrySettings,
    pub provider: ProviderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jobs: 4,
            state_file: None,
            retry: RetrySettings::default(),
            provider: ProviderSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            backoff_factor: 2.0,
            max_delay_ms: 60_000,
        }
    }
}

impl RetrySettings {
    /// Reject values the backoff arithmetic cannot use
    pub fn check(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor <= 0.0 {
            bail!(
                "retry.backoff_factor must be a positive number, got {}",
                self.backoff_factor
            );
        }
        Ok(())
    }

    pub fn to_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Simulated provider knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub region: String,
    /// Delay added to every provider call
    pub latency_ms: u64,
    /// Node ids whose provider calls are rejected
    pub fail_nodes: BTreeSet<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            latency_ms: 0,
            fail_nodes: BTreeSet::new(),
        }
    }
}

impl Settings {
    /// Default settings file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load settings from `path` (or the default path), falling back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            log::debug!("Settings file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        settings
            .retry
            .check()
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Resolve the state file: CLI flag, then settings, then the default location
    pub fn state_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(path.to_path_buf());
        }
        if let Some(configured) = &self.state_file {
            let expanded = shellexpand::tilde(configured);
            return Ok(PathBuf::from(expanded.as_ref()));
        }
        crate::state::StateFile::default_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
jobs = 8

[retry]
max_attempts = 5

[provider]
fail_nodes = ["lt1"]
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.jobs, 8);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_delay_ms, 2000);
        assert_eq!(settings.provider.region, "us-east-1");
        assert!(settings.provider.fail_nodes.contains("lt1"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "jobs = \"many\"").unwrap();

        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn test_unusable_backoff_factor_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        for factor in ["-2.0", "0.0", "nan"] {
            fs::write(&path, format!("[retry]\nbackoff_factor = {factor}\n")).unwrap();
            let err = Settings::load(Some(&path)).unwrap_err();
            assert!(format!("{err:#}").contains("backoff_factor"), "{factor}");
        }
    }

    #[test]
    fn test_state_path_precedence() {
        let settings = Settings {
            state_file: Some("/srv/webtier/state.toml".into()),
            ..Default::default()
        };
        assert_eq!(
            settings.state_path(Some(Path::new("/tmp/s.toml"))).unwrap(),
            PathBuf::from("/tmp/s.toml")
        );
        assert_eq!(
            settings.state_path(None).unwrap(),
            PathBuf::from("/srv/webtier/state.toml")
        );
    }

    #[test]
    fn test_retry_settings_to_config() {
        let config = RetrySettings::default().to_config();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_secs(2));
        assert_eq!(config.max_delay, Duration::from_secs(60));
    }
}
