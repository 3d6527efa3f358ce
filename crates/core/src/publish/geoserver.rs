//! GeoServer REST implementation of [`RasterPublisher`].

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::config::PublishConfig;
use super::error::PublishError;
use super::traits::RasterPublisher;

/// Publishes rasters through the GeoServer REST API.
pub struct GeoServerPublisher {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl GeoServerPublisher {
    pub fn new(config: &PublishConfig) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(PublishError::from_reqwest)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn workspace_url(&self, workspace: &str) -> String {
        format!(
            "{}/rest/workspaces/{}.json",
            self.base_url,
            urlencoding::encode(workspace)
        )
    }

    fn coverage_url(&self, workspace: &str, layer: &str) -> String {
        format!(
            "{}/rest/workspaces/{}/coveragestores/{}/file.geotiff?coverageName={}",
            self.base_url,
            urlencoding::encode(workspace),
            urlencoding::encode(layer),
            urlencoding::encode(layer)
        )
    }

    fn layer_url(&self, workspace: &str, layer: &str) -> String {
        format!(
            "{}/rest/layers/{}:{}",
            self.base_url,
            urlencoding::encode(workspace),
            urlencoding::encode(layer)
        )
    }

    async fn expect_success(operation: &str, response: Response) -> Result<(), PublishError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PublishError::http(
            operation,
            status.as_u16(),
            body.chars().take(200).collect::<String>(),
        ))
    }
}

#[async_trait]
impl RasterPublisher for GeoServerPublisher {
    fn name(&self) -> &str {
        "geoserver"
    }

    async fn ensure_workspace(&self, workspace: &str) -> Result<bool, PublishError> {
        let response = self
            .client
            .get(self.workspace_url(workspace))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(PublishError::from_reqwest)?;

        if response.status().is_success() {
            debug!(workspace, "Workspace exists");
            return Ok(false);
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            return Self::expect_success("get workspace", response).await.map(|_| false);
        }

        let body = json!({ "workspace": { "name": workspace } });
        let created = self
            .client
            .post(format!("{}/rest/workspaces", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(PublishError::from_reqwest)?;
        Self::expect_success("create workspace", created).await?;

        let default = self
            .client
            .put(format!("{}/rest/workspaces/default.json", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(PublishError::from_reqwest)?;
        Self::expect_success("set default workspace", default).await?;

        info!(workspace, "Workspace created and set as default");
        Ok(true)
    }

    async fn publish_coverage(
        &self,
        workspace: &str,
        layer: &str,
        source: &Path,
    ) -> Result<(), PublishError> {
        let bytes = tokio::fs::read(source).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PublishError::SourceMissing {
                path: source.to_path_buf(),
            },
            _ => PublishError::Io(e),
        })?;

        let response = self
            .client
            .put(self.coverage_url(workspace, layer))
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "image/tiff")
            .body(bytes)
            .send()
            .await
            .map_err(PublishError::from_reqwest)?;
        Self::expect_success("upload coverage", response).await?;

        debug!(workspace, layer, source = %source.display(), "Coverage uploaded");
        Ok(())
    }

    async fn assign_style(
        &self,
        workspace: &str,
        layer: &str,
        style: &str,
    ) -> Result<(), PublishError> {
        let response = self
            .client
            .put(self.layer_url(workspace, layer))
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "layer": { "defaultStyle": { "name": style } } }))
            .send()
            .await
            .map_err(PublishError::from_reqwest)?;
        Self::expect_success("assign style", response).await?;

        debug!(workspace, layer, style, "Style assigned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> GeoServerPublisher {
        GeoServerPublisher::new(&PublishConfig {
            url: "http://localhost:8080/geoserver/".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let p = publisher();
        assert_eq!(
            p.workspace_url("EHCPA"),
            "http://localhost:8080/geoserver/rest/workspaces/EHCPA.json"
        );
        assert_eq!(
            p.coverage_url("EHCPA", "SPI_scale_3_Raster"),
            "http://localhost:8080/geoserver/rest/workspaces/EHCPA/coveragestores/SPI_scale_3_Raster/file.geotiff?coverageName=SPI_scale_3_Raster"
        );
        assert_eq!(
            p.layer_url("EHCPA", "PTM_Raster"),
            "http://localhost:8080/geoserver/rest/layers/EHCPA:PTM_Raster"
        );
    }

    #[tokio::test]
    async fn test_missing_source_fails_before_upload() {
        let p = publisher();
        let err = p
            .publish_coverage("EHCPA", "PTM_Raster", Path::new("/nonexistent/ptm.tif"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::SourceMissing { .. }));
    }
}
