//! Configuration for raster publishing.

use serde::{Deserialize, Serialize};

/// GeoServer connection and layer naming.
///
/// Source paths accept stage placeholders such as `{output_dir}`; index
/// layer names and sources also receive `{scale}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_workspace")]
    pub workspace: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_precipitation_layer")]
    pub precipitation_layer: String,

    #[serde(default = "default_precipitation_style")]
    pub precipitation_style: String,

    #[serde(default = "default_precipitation_source")]
    pub precipitation_source: String,

    #[serde(default = "default_index_layer")]
    pub index_layer: String,

    #[serde(default = "default_index_style")]
    pub index_style: String,

    #[serde(default = "default_index_source")]
    pub index_source: String,
}

fn default_url() -> String {
    "http://127.0.0.1:8080/geoserver".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_workspace() -> String {
    "EHCPA".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_precipitation_layer() -> String {
    "PTM_Raster".to_string()
}

fn default_precipitation_style() -> String {
    "PTM_Style".to_string()
}

fn default_precipitation_source() -> String {
    "{output_dir}/geoserver/PTM/PTM_jun_2000_present_last_band_ARG_cropped.tif".to_string()
}

fn default_index_layer() -> String {
    "SPI_scale_{scale}_Raster".to_string()
}

fn default_index_style() -> String {
    "SPI_Style".to_string()
}

fn default_index_source() -> String {
    "{output_dir}/geoserver/SPI/SPI_jun_2000_present_scale_{scale}_last_band_ARG_cropped.tif"
        .to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: default_username(),
            password: String::new(),
            workspace: default_workspace(),
            timeout_secs: default_timeout_secs(),
            precipitation_layer: default_precipitation_layer(),
            precipitation_style: default_precipitation_style(),
            precipitation_source: default_precipitation_source(),
            index_layer: default_index_layer(),
            index_style: default_index_style(),
            index_source: default_index_source(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            url = "https://maps.example.org/geoserver"
            password = "secret"
        "#;
        let config: PublishConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.url, "https://maps.example.org/geoserver");
        assert_eq!(config.workspace, "EHCPA");
        assert_eq!(config.index_layer, "SPI_scale_{scale}_Raster");
        assert_eq!(config.precipitation_style, "PTM_Style");
    }
}
