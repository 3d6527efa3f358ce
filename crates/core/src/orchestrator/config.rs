//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the pipeline orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Stop the run at the first download error.
    /// When false, the run records the error and still runs the stages over
    /// whatever was downloaded.
    #[serde(default = "default_abort_on_download_error")]
    pub abort_on_download_error: bool,

    /// Extra pause between stages (milliseconds).
    /// Stages already wait for their outputs to settle; this is only for
    /// external tools that keep files open after exiting.
    #[serde(default)]
    pub inter_stage_pause_ms: u64,

    /// Number of runs returned by the history endpoint.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_abort_on_download_error() -> bool {
    true
}

fn default_history_limit() -> usize {
    50
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            abort_on_download_error: default_abort_on_download_error(),
            inter_stage_pause_ms: 0,
            history_limit: default_history_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert!(config.abort_on_download_error);
        assert_eq!(config.inter_stage_pause_ms, 0);
        assert_eq!(config.history_limit, 50);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert!(config.abort_on_download_error);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            abort_on_download_error = false
            inter_stage_pause_ms = 2000
            history_limit = 10
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert!(!config.abort_on_download_error);
        assert_eq!(config.inter_stage_pause_ms, 2000);
        assert_eq!(config.history_limit, 10);
    }
}
