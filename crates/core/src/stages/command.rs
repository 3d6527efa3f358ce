//! Stage backed by an external program.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::config::CommandStageConfig;
use super::error::StageError;
use super::template::TemplateVars;
use super::traits::Stage;
use super::types::{StageContext, StageKind, StageReport};

/// Runs a configured command, once or once per drought-index scale.
pub struct CommandStage {
    kind: StageKind,
    config: CommandStageConfig,
    timeout_secs: u64,
}

impl CommandStage {
    pub fn new(kind: StageKind, config: CommandStageConfig, default_timeout_secs: u64) -> Self {
        let timeout_secs = config.timeout_secs.unwrap_or(default_timeout_secs);
        Self {
            kind,
            config,
            timeout_secs,
        }
    }

    async fn invoke(&self, vars: &TemplateVars) -> Result<Vec<PathBuf>, StageError> {
        let program = vars.render(&self.config.program)?;
        let args = self
            .config
            .args
            .iter()
            .map(|a| vars.render(a))
            .collect::<Result<Vec<_>, _>>()?;

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(vars.render(dir)?);
        }

        debug!(stage = %self.kind, program = %program, ?args, "Running stage command");

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StageError::ProgramNotFound {
                    stage: self.kind,
                    program: program.clone(),
                }
            } else {
                StageError::Io(e)
            }
        })?;

        // kill_on_drop reaps the child if the timeout fires first
        let output = match timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(StageError::Timeout {
                    stage: self.kind,
                    timeout_secs: self.timeout_secs,
                })
            }
        };

        if !output.status.success() {
            return Err(StageError::command_failed(
                self.kind,
                output.status.code(),
                &output.stderr,
            ));
        }

        self.config
            .outputs
            .iter()
            .map(|o| vars.render(o).map(PathBuf::from))
            .collect()
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageReport, StageError> {
        let started = Instant::now();
        let mut outputs = Vec::new();

        if self.config.per_scale {
            for scale in &ctx.scales {
                outputs.extend(self.invoke(&ctx.vars_for_scale(*scale)).await?);
            }
        } else {
            outputs.extend(self.invoke(&ctx.vars()).await?);
        }

        info!(
            stage = %self.kind,
            outputs = outputs.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage command finished"
        );

        Ok(StageReport {
            outputs,
            detail: self
                .config
                .per_scale
                .then(|| format!("{} scales", ctx.scales.len())),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::calendar::CalibrationWindow;
    use crate::config::PathsConfig;
    use crate::orchestrator::DateRange;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn context(dir: &TempDir, scales: Vec<u32>) -> StageContext {
        StageContext {
            run_id: "run-1".to_string(),
            today: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            range: DateRange::single(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()),
            window: CalibrationWindow {
                end_year: 2024,
                end_month: "mar".to_string(),
            },
            paths: PathsConfig {
                output_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
            scales,
        }
    }

    fn shell(script: &str, outputs: Vec<&str>, per_scale: bool) -> CommandStageConfig {
        CommandStageConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            outputs: outputs.into_iter().map(String::from).collect(),
            per_scale,
            working_dir: None,
            timeout_secs: None,
        }
    }

    #[tokio::test]
    async fn test_runs_with_templated_args() {
        let dir = TempDir::new().unwrap();
        let config = shell(
            "echo {calibration_end_month} > {output_dir}/window_{calibration_end_year}.txt",
            vec!["{output_dir}/window_{calibration_end_year}.txt"],
            false,
        );
        let stage = CommandStage::new(StageKind::Aggregate, config, 10);

        let report = stage.run(&context(&dir, vec![])).await.unwrap();
        assert_eq!(report.outputs, vec![dir.path().join("window_2024.txt")]);
        let content = std::fs::read_to_string(dir.path().join("window_2024.txt")).unwrap();
        assert_eq!(content.trim(), "mar");
    }

    #[tokio::test]
    async fn test_per_scale_runs_once_per_scale() {
        let dir = TempDir::new().unwrap();
        let config = shell(
            "touch {output_dir}/spi_{scale}.nc",
            vec!["{output_dir}/spi_{scale}.nc"],
            true,
        );
        let stage = CommandStage::new(StageKind::DroughtIndex, config, 10);

        let report = stage.run(&context(&dir, vec![1, 3, 12])).await.unwrap();
        assert_eq!(report.outputs.len(), 3);
        assert!(dir.path().join("spi_12.nc").exists());
        assert_eq!(report.detail.as_deref(), Some("3 scales"));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let dir = TempDir::new().unwrap();
        let stage = CommandStage::new(
            StageKind::Concatenate,
            shell("echo broken >&2; exit 3", vec![], false),
            10,
        );

        match stage.run(&context(&dir, vec![])).await.unwrap_err() {
            StageError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.as_deref(), Some("broken"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let config = CommandStageConfig {
            program: "definitely-not-a-real-program-4821".to_string(),
            args: vec![],
            outputs: vec![],
            per_scale: false,
            working_dir: None,
            timeout_secs: None,
        };
        let stage = CommandStage::new(StageKind::IndexCrop, config, 10);
        assert!(matches!(
            stage.run(&context(&dir, vec![])).await,
            Err(StageError::ProgramNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let mut config = shell("sleep 5", vec![], false);
        config.timeout_secs = Some(1);
        let stage = CommandStage::new(StageKind::PrecipitationCrop, config, 10);
        assert!(matches!(
            stage.run(&context(&dir, vec![])).await,
            Err(StageError::Timeout { timeout_secs: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_placeholder_fails_before_spawn() {
        let dir = TempDir::new().unwrap();
        let stage = CommandStage::new(
            StageKind::Aggregate,
            shell("echo {nope}", vec![], false),
            10,
        );
        assert!(matches!(
            stage.run(&context(&dir, vec![])).await,
            Err(StageError::UnknownPlaceholder { .. })
        ));
    }
}
