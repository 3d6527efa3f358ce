//! Download-ready products and their file names.
//!
//! Two product families exist: the precipitation stack (`PTM`) and one
//! drought-index stack per accumulation scale (`SPI_<scale>`). File names
//! embed the calibration window, so they change once a month.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::calendar::CalibrationWindow;
use crate::stages::TemplateVars;

/// Product file naming, relative to the download-ready directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductsConfig {
    #[serde(default = "default_precipitation_file")]
    pub precipitation_file: String,

    #[serde(default = "default_index_file")]
    pub index_file: String,

    #[serde(default = "default_precipitation_archive")]
    pub precipitation_archive: String,

    #[serde(default = "default_index_archive")]
    pub index_archive: String,

    /// Name of the on-demand bundle served over HTTP.
    #[serde(default = "default_bundle_name")]
    pub bundle_name: String,
}

fn default_precipitation_file() -> String {
    "PTM/PTM_jun_2000_{calibration_end_month}_{calibration_end_year}_all_bands_ARG_cropped.tif"
        .to_string()
}

fn default_index_file() -> String {
    "SPI/SPI_jun_2000_{calibration_end_month}_{calibration_end_year}_scale_{scale}_all_bands_ARG_cropped.tif"
        .to_string()
}

fn default_precipitation_archive() -> String {
    "EHCPA_PTM_Data.zip".to_string()
}

fn default_index_archive() -> String {
    "EHCPA_SPI_scale_{scale}.zip".to_string()
}

fn default_bundle_name() -> String {
    "EHCPA_Data.zip".to_string()
}

impl Default for ProductsConfig {
    fn default() -> Self {
        Self {
            precipitation_file: default_precipitation_file(),
            index_file: default_index_file(),
            precipitation_archive: default_precipitation_archive(),
            index_archive: default_index_archive(),
            bundle_name: default_bundle_name(),
        }
    }
}

/// Errors raised while resolving products.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("unknown product identifier: {0}")]
    InvalidIdentifier(String),

    #[error("unsupported drought index scale: {0}")]
    InvalidScale(String),

    #[error("invalid product file template: {0}")]
    Template(String),
}

/// A downloadable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductId {
    Precipitation,
    DroughtIndex(u32),
}

impl ProductId {
    /// Parses `PTM` or `SPI_<scale>`, accepting only configured scales.
    pub fn parse(value: &str, scales: &[u32]) -> Result<Self, ProductError> {
        if value == "PTM" {
            return Ok(Self::Precipitation);
        }
        let Some(scale) = value.strip_prefix("SPI_") else {
            return Err(ProductError::InvalidIdentifier(value.to_string()));
        };
        match scale.parse::<u32>() {
            Ok(n) if scales.contains(&n) => Ok(Self::DroughtIndex(n)),
            _ => Err(ProductError::InvalidScale(scale.to_string())),
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precipitation => f.write_str("PTM"),
            Self::DroughtIndex(scale) => write!(f, "SPI_{}", scale),
        }
    }
}

/// Outcome of resolving a list of identifiers against the filesystem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedProducts {
    pub found: Vec<PathBuf>,
    /// Identifiers whose file does not exist yet.
    pub missing: Vec<String>,
}

/// Maps product identifiers to files in the download-ready directory.
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    dir: PathBuf,
    config: ProductsConfig,
    scales: Vec<u32>,
}

impl ProductCatalog {
    pub fn new(dir: impl Into<PathBuf>, config: ProductsConfig, scales: Vec<u32>) -> Self {
        Self {
            dir: dir.into(),
            config,
            scales,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn scales(&self) -> &[u32] {
        &self.scales
    }

    pub fn bundle_name(&self) -> &str {
        &self.config.bundle_name
    }

    /// Every product, precipitation first.
    pub fn all(&self) -> Vec<ProductId> {
        std::iter::once(ProductId::Precipitation)
            .chain(self.scales.iter().map(|s| ProductId::DroughtIndex(*s)))
            .collect()
    }

    fn vars(id: ProductId, window: &CalibrationWindow) -> TemplateVars {
        let vars = TemplateVars::new()
            .with("calibration_end_year", window.end_year)
            .with("calibration_end_month", &window.end_month);
        match id {
            ProductId::Precipitation => vars,
            ProductId::DroughtIndex(scale) => vars.with("scale", scale),
        }
    }

    fn render(&self, template: &str, vars: &TemplateVars) -> Result<PathBuf, ProductError> {
        vars.render(template)
            .map(|rel| self.dir.join(rel))
            .map_err(|e| ProductError::Template(e.to_string()))
    }

    /// Data file of a product for a calibration window.
    pub fn file_for(&self, id: ProductId, window: &CalibrationWindow) -> Result<PathBuf, ProductError> {
        let template = match id {
            ProductId::Precipitation => &self.config.precipitation_file,
            ProductId::DroughtIndex(_) => &self.config.index_file,
        };
        self.render(template, &Self::vars(id, window))
    }

    /// Per-product archive kept next to the data files.
    pub fn archive_for(&self, id: ProductId, window: &CalibrationWindow) -> Result<PathBuf, ProductError> {
        let template = match id {
            ProductId::Precipitation => &self.config.precipitation_archive,
            ProductId::DroughtIndex(_) => &self.config.index_archive,
        };
        self.render(template, &Self::vars(id, window))
    }

    /// Resolves a comma-separated identifier list.
    ///
    /// The first invalid identifier or scale fails the whole request; valid
    /// identifiers whose file does not exist are reported as missing.
    pub async fn resolve(
        &self,
        ids: &str,
        window: &CalibrationWindow,
    ) -> Result<ResolvedProducts, ProductError> {
        let mut resolved = ResolvedProducts::default();

        for raw in ids.split(',') {
            let raw = raw.trim();
            let id = ProductId::parse(raw, &self.scales)?;
            let path = self.file_for(id, window)?;
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                resolved.found.push(path);
            } else {
                resolved.missing.push(raw.to_string());
            }
        }

        Ok(resolved)
    }
}
