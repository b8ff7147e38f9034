//! Opaque host configuration consumed by the monitoring agent.
//!
//! Directory-layout resolution belongs to the host; the agent only sees one
//! directory per instance plus the deployment mode.

use std::path::{Path, PathBuf};

/// Whether adapter statistics live in their own shared regions (separated)
/// or are folded into each instance's own container region (embedded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Separated,
    Embedded,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown deployment mode `{0}`, expected `separated` or `embedded`")]
pub struct ParseDeploymentModeError(String);

impl std::str::FromStr for DeploymentMode {
    type Err = ParseDeploymentModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "separated" => Ok(Self::Separated),
            "embedded" => Ok(Self::Embedded),
            _ => Err(ParseDeploymentModeError(s.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("at least one instance directory is required")]
    NoInstances,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Instance directories and topology for one deployment.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    instance_directories: Vec<PathBuf>,
    deployment_mode: DeploymentMode,
}

impl MonitorConfig {
    /// # Errors
    ///
    /// Returns [`Error::NoInstances`] when `instance_directories` is empty.
    pub fn new(
        instance_directories: Vec<PathBuf>,
        deployment_mode: DeploymentMode,
    ) -> Result<Self> {
        if instance_directories.is_empty() {
            return Err(Error::NoInstances);
        }
        Ok(Self {
            instance_directories,
            deployment_mode,
        })
    }

    pub fn instance_count(&self) -> usize {
        self.instance_directories.len()
    }

    pub fn instance_directory(&self, instance: usize) -> &Path {
        &self.instance_directories[instance]
    }

    /// The primary (index 0) instance directory, which in separated mode
    /// also holds the shared adapter statistics files.
    pub fn primary_directory(&self) -> &Path {
        self.instance_directory(0)
    }

    pub fn deployment_mode(&self) -> DeploymentMode {
        self.deployment_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_mode_parsing() {
        assert_eq!(
            "separated".parse::<DeploymentMode>().unwrap(),
            DeploymentMode::Separated
        );
        assert_eq!(
            "Embedded".parse::<DeploymentMode>().unwrap(),
            DeploymentMode::Embedded
        );
        assert!("detached".parse::<DeploymentMode>().is_err());
    }

    #[test]
    fn test_config_requires_instances() {
        assert!(matches!(
            MonitorConfig::new(Vec::new(), DeploymentMode::Embedded),
            Err(Error::NoInstances)
        ));
    }
}
