//! Trait definitions for the publish module.

use async_trait::async_trait;
use std::path::Path;

use super::error::PublishError;

/// A map server that serves raster layers.
#[async_trait]
pub trait RasterPublisher: Send + Sync {
    fn name(&self) -> &str;

    /// Makes sure the workspace exists. Returns `true` if it had to be created.
    async fn ensure_workspace(&self, workspace: &str) -> Result<bool, PublishError>;

    /// Uploads a GeoTIFF as a coverage store named after the layer,
    /// replacing any previous upload.
    async fn publish_coverage(
        &self,
        workspace: &str,
        layer: &str,
        source: &Path,
    ) -> Result<(), PublishError>;

    /// Sets the default style of a published layer.
    async fn assign_style(
        &self,
        workspace: &str,
        layer: &str,
        style: &str,
    ) -> Result<(), PublishError>;
}
