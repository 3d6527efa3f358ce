//! Publishing as a pipeline stage.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::stages::{Stage, StageContext, StageError, StageKind, StageReport, TemplateVars};

use super::config::PublishConfig;
use super::error::PublishError;
use super::traits::RasterPublisher;

/// Pushes the precipitation raster and every index raster to the map server.
pub struct PublishStage {
    publisher: Arc<dyn RasterPublisher>,
    config: PublishConfig,
}

impl PublishStage {
    pub fn new(publisher: Arc<dyn RasterPublisher>, config: PublishConfig) -> Self {
        Self { publisher, config }
    }

    async fn publish_layer(
        &self,
        vars: &TemplateVars,
        layer: &str,
        source: &str,
        style: &str,
    ) -> Result<String, PublishError> {
        let render = |t: &str| vars.render(t).map_err(|e| PublishError::Template(e.to_string()));
        let layer = render(layer)?;
        let source = PathBuf::from(render(source)?);
        let workspace = &self.config.workspace;

        self.publisher
            .publish_coverage(workspace, &layer, &source)
            .await?;
        self.publisher.assign_style(workspace, &layer, style).await?;
        Ok(layer)
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn kind(&self) -> StageKind {
        StageKind::Publish
    }

    fn requires_network(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageReport, StageError> {
        self.publisher.ensure_workspace(&self.config.workspace).await?;

        let mut layers = vec![
            self.publish_layer(
                &ctx.vars(),
                &self.config.precipitation_layer,
                &self.config.precipitation_source,
                &self.config.precipitation_style,
            )
            .await?,
        ];

        for scale in &ctx.scales {
            layers.push(
                self.publish_layer(
                    &ctx.vars_for_scale(*scale),
                    &self.config.index_layer,
                    &self.config.index_source,
                    &self.config.index_style,
                )
                .await?,
            );
        }

        info!(
            publisher = self.publisher.name(),
            workspace = %self.config.workspace,
            layers = layers.len(),
            "Rasters published"
        );

        Ok(StageReport {
            outputs: Vec::new(),
            detail: Some(format!("published {}", layers.join(", "))),
        })
    }
}
