//! Configuration for delegated stages.

use serde::{Deserialize, Serialize};

/// One external command run as a pipeline stage.
///
/// `program`, `args`, `outputs` and `working_dir` accept `{placeholder}`
/// templates, e.g. `{raw_dir}`, `{calibration_end_year}` or `{scale}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStageConfig {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Files the stage must leave behind before the next stage starts.
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Run once per drought-index scale, with `{scale}` bound each time.
    #[serde(default)]
    pub per_scale: bool,

    #[serde(default)]
    pub working_dir: Option<String>,

    /// Overrides the shared stage timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Settings for every stage of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    /// Timeout for a single command invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How long to wait for declared outputs to settle, in milliseconds.
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,

    /// Interval between output size checks, in milliseconds.
    #[serde(default = "default_readiness_poll_ms")]
    pub readiness_poll_ms: u64,

    /// Drought-index accumulation scales, in months.
    #[serde(default = "default_scales")]
    pub scales: Vec<u32>,

    #[serde(default)]
    pub aggregate: Option<CommandStageConfig>,

    #[serde(default)]
    pub concatenate: Option<CommandStageConfig>,

    #[serde(default)]
    pub precipitation_crop: Option<CommandStageConfig>,

    #[serde(default)]
    pub drought_index: Option<CommandStageConfig>,

    #[serde(default)]
    pub index_crop: Option<CommandStageConfig>,

    /// Build download-ready archives after publishing.
    #[serde(default = "default_true")]
    pub archive: bool,
}

fn default_timeout_secs() -> u64 {
    7_200
}

fn default_readiness_timeout_ms() -> u64 {
    60_000
}

fn default_readiness_poll_ms() -> u64 {
    1_000
}

pub(crate) fn default_scales() -> Vec<u32> {
    vec![1, 2, 3, 6, 9, 12, 24, 36, 48, 60, 72]
}

fn default_true() -> bool {
    true
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            readiness_poll_ms: default_readiness_poll_ms(),
            scales: default_scales(),
            aggregate: None,
            concatenate: None,
            precipitation_crop: None,
            drought_index: None,
            index_crop: None,
            archive: true,
        }
    }
}
