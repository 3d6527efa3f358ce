//! Types shared by pipeline stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::calendar::CalibrationWindow;
use crate::config::PathsConfig;
use crate::orchestrator::{DateRange, PipelinePhase};

use super::template::TemplateVars;

/// Delegated pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Daily files summed into monthly totals.
    Aggregate,
    /// Monthly files concatenated and reordered into one stack.
    Concatenate,
    /// Precipitation stack converted to raster and cropped.
    PrecipitationCrop,
    /// Drought index fitted per scale.
    DroughtIndex,
    /// Drought index stacks converted to raster and cropped.
    IndexCrop,
    /// Rasters pushed to the map server.
    Publish,
    /// Download-ready archives built.
    Archive,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::Aggregate,
        StageKind::Concatenate,
        StageKind::PrecipitationCrop,
        StageKind::DroughtIndex,
        StageKind::IndexCrop,
        StageKind::Publish,
        StageKind::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::Concatenate => "concatenate",
            Self::PrecipitationCrop => "precipitation_crop",
            Self::DroughtIndex => "drought_index",
            Self::IndexCrop => "index_crop",
            Self::Publish => "publish",
            Self::Archive => "archive",
        }
    }

    /// Phase the orchestrator reports while this stage runs.
    pub fn phase(&self) -> PipelinePhase {
        match self {
            Self::Aggregate => PipelinePhase::Aggregating,
            Self::Concatenate | Self::PrecipitationCrop => PipelinePhase::Concatenating,
            Self::DroughtIndex | Self::IndexCrop => PipelinePhase::ComputingIndex,
            Self::Publish | Self::Archive => PipelinePhase::Publishing,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs every stage sees for one run.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub run_id: String,
    pub today: NaiveDate,
    pub range: DateRange,
    pub window: CalibrationWindow,
    pub paths: PathsConfig,
    /// Drought-index accumulation scales, in months.
    pub scales: Vec<u32>,
}

impl StageContext {
    /// Placeholder values available to stage templates.
    pub fn vars(&self) -> TemplateVars {
        let mut vars = TemplateVars::new();
        vars.set("run_id", &self.run_id)
            .set("today", self.today.format("%Y-%m-%d"))
            .set("begin", self.range.begin.format("%Y-%m-%d"))
            .set("end", self.range.end.format("%Y-%m-%d"))
            .set("calibration_end_year", self.window.end_year)
            .set("calibration_end_month", &self.window.end_month)
            .set("calibration_label", self.window.label())
            .set("raw_dir", self.paths.raw_dir.display())
            .set("monthly_dir", self.paths.monthly_dir.display())
            .set("input_dir", self.paths.input_dir.display())
            .set("output_dir", self.paths.output_dir.display())
            .set("downloadable_dir", self.paths.downloadable_dir.display());
        vars
    }

    /// Template values for one drought-index scale.
    pub fn vars_for_scale(&self, scale: u32) -> TemplateVars {
        self.vars().with("scale", scale)
    }
}

/// What a stage produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    /// Files the next stage depends on.
    pub outputs: Vec<PathBuf>,
    /// Free-form note for the run log.
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_ordered() {
        let mut shuffled = vec![
            StageKind::Archive,
            StageKind::Aggregate,
            StageKind::Publish,
            StageKind::DroughtIndex,
        ];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![
                StageKind::Aggregate,
                StageKind::DroughtIndex,
                StageKind::Publish,
                StageKind::Archive
            ]
        );
    }

    #[test]
    fn test_phase_mapping() {
        assert_eq!(StageKind::Aggregate.phase(), PipelinePhase::Aggregating);
        assert_eq!(StageKind::PrecipitationCrop.phase(), PipelinePhase::Concatenating);
        assert_eq!(StageKind::IndexCrop.phase(), PipelinePhase::ComputingIndex);
        assert_eq!(StageKind::Archive.phase(), PipelinePhase::Publishing);
    }

    #[test]
    fn test_context_vars() {
        let ctx = StageContext {
            run_id: "run-1".to_string(),
            today: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            range: DateRange::single(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
            window: CalibrationWindow {
                end_year: 2024,
                end_month: "feb".to_string(),
            },
            paths: PathsConfig::default(),
            scales: vec![1, 3],
        };

        let vars = ctx.vars_for_scale(3);
        assert_eq!(vars.get("calibration_end_month"), Some("feb"));
        assert_eq!(vars.get("calibration_end_year"), Some("2024"));
        assert_eq!(vars.get("begin"), Some("2024-02-29"));
        assert_eq!(vars.get("scale"), Some("3"));
        assert_eq!(vars.get("raw_dir"), Some("data/raw"));
    }
}
