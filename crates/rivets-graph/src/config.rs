//! Configuration for the dependency graph engine.
//!
//! Configuration is plain YAML, in the same style as the rivets project
//! config:
//!
//! ```yaml
//! rejected-dependency: blocks   # or "satisfies"
//! query-timeout-ms: 5000        # optional deadline for every traversal
//! ```

use crate::cancel::CancelToken;
use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How a `rejected` dependency affects its dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectedPolicy {
    /// A rejected dependency is never done, so its dependents stay blocked
    /// until someone removes the edge.
    #[default]
    Blocks,

    /// A rejected dependency counts as resolved, like a done one.
    Satisfies,
}

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GraphConfig {
    /// Treatment of rejected dependencies when resolving availability
    pub rejected_dependency: RejectedPolicy,

    /// Deadline applied to traversals that are not given an explicit token
    pub query_timeout_ms: Option<u64>,
}

impl GraphConfig {
    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` if the YAML is malformed or the values
    /// fail [`validate`](Self::validate).
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| GraphError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Io` if the file cannot be read and
    /// `GraphError::Config` if its contents are invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        tracing::debug!(path = %path.display(), ?config, "Loaded graph config");
        Ok(config)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| GraphError::Config(format!("YAML error: {e}")))
    }

    /// Check that values are usable.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` for a zero timeout, which would cancel
    /// every query before it starts.
    pub fn validate(&self) -> Result<()> {
        if self.query_timeout_ms == Some(0) {
            return Err(GraphError::Config(
                "query-timeout-ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Token used by queries that were not handed one explicitly.
    #[must_use]
    pub fn default_cancel_token(&self) -> CancelToken {
        match self.query_timeout_ms {
            Some(ms) => CancelToken::with_timeout(Duration::from_millis(ms)),
            None => CancelToken::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = GraphConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
        assert_eq!(config.rejected_dependency, RejectedPolicy::Blocks);
        assert!(config.query_timeout_ms.is_none());
    }

    #[test]
    fn parses_kebab_case_keys() {
        let config = GraphConfig::from_yaml_str(
            "rejected-dependency: satisfies\nquery-timeout-ms: 250\n",
        )
        .unwrap();

        assert_eq!(config.rejected_dependency, RejectedPolicy::Satisfies);
        assert_eq!(config.query_timeout_ms, Some(250));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = GraphConfig::from_yaml_str("query-timeout-ms: 0").unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn unknown_policy_is_a_config_error() {
        let err = GraphConfig::from_yaml_str("rejected-dependency: maybe").unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rejected-dependency: satisfies").unwrap();

        let config = GraphConfig::load(file.path()).unwrap();
        assert_eq!(config.rejected_dependency, RejectedPolicy::Satisfies);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GraphConfig::load(&dir.path().join("graph.yaml")).unwrap_err();
        assert!(matches!(err, GraphError::Io(_)));
    }

    #[test]
    fn yaml_round_trip() {
        let config = GraphConfig {
            rejected_dependency: RejectedPolicy::Satisfies,
            query_timeout_ms: Some(1000),
        };
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(GraphConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
