//! Mock raster publisher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::publish::{PublishError, RasterPublisher};

/// Mock implementation of the RasterPublisher trait.
#[derive(Debug)]
pub struct MockRasterPublisher {
    workspaces: Arc<RwLock<Vec<String>>>,
    coverages: Arc<RwLock<Vec<(String, PathBuf)>>>,
    styles: Arc<RwLock<HashMap<String, String>>>,
    /// If set, the next call of any kind fails with this error.
    next_error: Arc<RwLock<Option<PublishError>>>,
}

impl Default for MockRasterPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRasterPublisher {
    pub fn new() -> Self {
        Self {
            workspaces: Arc::new(RwLock::new(Vec::new())),
            coverages: Arc::new(RwLock::new(Vec::new())),
            styles: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_next_error(&self, error: PublishError) {
        *self.next_error.write().await = Some(error);
    }

    /// Workspaces ensured, in order.
    pub async fn workspaces(&self) -> Vec<String> {
        self.workspaces.read().await.clone()
    }

    /// `(layer, source, style)` for every uploaded coverage, in upload order.
    /// The style is empty if none was assigned.
    pub async fn published(&self) -> Vec<(String, PathBuf, String)> {
        let styles = self.styles.read().await;
        self.coverages
            .read()
            .await
            .iter()
            .map(|(layer, source)| {
                (
                    layer.clone(),
                    source.clone(),
                    styles.get(layer).cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    async fn take_error(&self) -> Result<(), PublishError> {
        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RasterPublisher for MockRasterPublisher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn ensure_workspace(&self, workspace: &str) -> Result<bool, PublishError> {
        self.take_error().await?;
        let mut workspaces = self.workspaces.write().await;
        let created = !workspaces.iter().any(|w| w == workspace);
        workspaces.push(workspace.to_string());
        Ok(created)
    }

    async fn publish_coverage(
        &self,
        _workspace: &str,
        layer: &str,
        source: &Path,
    ) -> Result<(), PublishError> {
        self.take_error().await?;
        self.coverages
            .write()
            .await
            .push((layer.to_string(), source.to_path_buf()));
        Ok(())
    }

    async fn assign_style(
        &self,
        _workspace: &str,
        layer: &str,
        style: &str,
    ) -> Result<(), PublishError> {
        self.take_error().await?;
        self.styles
            .write()
            .await
            .insert(layer.to_string(), style.to_string());
        Ok(())
    }
}
