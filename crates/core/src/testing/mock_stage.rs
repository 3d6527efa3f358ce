//! Mock pipeline stage for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::stages::{Stage, StageContext, StageError, StageKind, StageReport};

/// Shared record of stage executions across several mocks.
pub type StageLog = Arc<RwLock<Vec<StageKind>>>;

/// Mock implementation of the Stage trait.
///
/// Writes its declared outputs when it runs, so the orchestrator's output
/// check passes, and can be told to fail or panic.
#[derive(Debug)]
pub struct MockStage {
    kind: StageKind,
    requires_network: bool,
    outputs: Vec<PathBuf>,
    panic_message: Option<String>,
    log: Option<StageLog>,
    /// If set, every run fails with this stderr.
    failure: Arc<RwLock<Option<String>>>,
    contexts: Arc<RwLock<Vec<StageContext>>>,
}

impl MockStage {
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            requires_network: false,
            outputs: Vec::new(),
            panic_message: None,
            log: None,
            failure: Arc::new(RwLock::new(None)),
            contexts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Files written on each successful run.
    pub fn with_outputs(mut self, outputs: Vec<PathBuf>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Mark the stage as talking to a remote service.
    pub fn with_network(mut self) -> Self {
        self.requires_network = true;
        self
    }

    /// Append the stage kind to `log` on each run.
    pub fn with_log(mut self, log: StageLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Panic instead of returning.
    pub fn panicking(mut self, message: &str) -> Self {
        self.panic_message = Some(message.to_string());
        self
    }

    /// Make runs fail as a command exiting with status 1.
    pub async fn set_failure(&self, stderr: Option<&str>) {
        *self.failure.write().await = stderr.map(String::from);
    }

    /// Number of runs.
    pub async fn runs(&self) -> usize {
        self.contexts.read().await.len()
    }

    /// Context of every run.
    pub async fn contexts(&self) -> Vec<StageContext> {
        self.contexts.read().await.clone()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn requires_network(&self) -> bool {
        self.requires_network
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageReport, StageError> {
        self.contexts.write().await.push(ctx.clone());
        if let Some(log) = &self.log {
            log.write().await.push(self.kind);
        }

        if let Some(message) = &self.panic_message {
            panic!("{}", message);
        }

        if let Some(stderr) = self.failure.read().await.clone() {
            return Err(StageError::CommandFailed {
                stage: self.kind,
                code: Some(1),
                stderr: Some(stderr),
            });
        }

        for output in &self.outputs {
            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(output, self.kind.as_str().as_bytes()).await?;
        }

        Ok(StageReport {
            outputs: self.outputs.clone(),
            detail: None,
        })
    }
}
