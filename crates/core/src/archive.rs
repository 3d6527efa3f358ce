//! Zip bundling of download-ready products.

use async_trait::async_trait;
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::products::{ProductCatalog, ProductId};
use crate::stages::{Stage, StageContext, StageError, StageKind, StageReport};

/// Errors raised while building archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("source file missing: {path}")]
    MissingSource { path: PathBuf },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid product name: {0}")]
    Product(String),

    #[error("archive task aborted: {0}")]
    Task(String),
}

/// Writes `files` into a zip stream, each under its base name.
pub fn write_bundle<W: Write + Seek>(writer: W, files: &[PathBuf]) -> Result<W, ArchiveError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ArchiveError::MissingSource { path: path.clone() })?;
        let mut source = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ArchiveError::MissingSource { path: path.clone() },
            _ => ArchiveError::Io(e),
        })?;
        zip.start_file(name, options)?;
        std::io::copy(&mut source, &mut zip)?;
    }

    Ok(zip.finish()?)
}

/// Bundles files into an in-memory zip.
pub fn bundle_to_bytes(files: &[PathBuf]) -> Result<Vec<u8>, ArchiveError> {
    Ok(write_bundle(Cursor::new(Vec::new()), files)?.into_inner())
}

/// Bundles files into `dest`, replacing it atomically. Returns the archive size.
pub async fn bundle_to_file(files: Vec<PathBuf>, dest: PathBuf) -> Result<u64, ArchiveError> {
    tokio::task::spawn_blocking(move || {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        let file = write_bundle(File::create(&partial)?, &files)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&partial, &dest)?;
        Ok(std::fs::metadata(&dest)?.len())
    })
    .await
    .map_err(|e| ArchiveError::Task(e.to_string()))?
}

/// Builds one archive per product.
///
/// The precipitation product is mandatory; drought-index products that were
/// not produced are skipped.
pub struct ArchiveStage {
    catalog: ProductCatalog,
}

impl ArchiveStage {
    pub fn new(catalog: ProductCatalog) -> Self {
        Self { catalog }
    }

    async fn archive_one(
        &self,
        id: ProductId,
        ctx: &StageContext,
    ) -> Result<Option<PathBuf>, ArchiveError> {
        let product = |e: crate::products::ProductError| ArchiveError::Product(e.to_string());
        let source = self.catalog.file_for(id, &ctx.window).map_err(product)?;
        let dest = self.catalog.archive_for(id, &ctx.window).map_err(product)?;

        if !exists(&source).await {
            if id == ProductId::Precipitation {
                return Err(ArchiveError::MissingSource { path: source });
            }
            debug!(product = %id, path = %source.display(), "Skipping missing product");
            return Ok(None);
        }

        let size = bundle_to_file(vec![source], dest.clone()).await?;
        debug!(product = %id, archive = %dest.display(), size, "Archive written");
        Ok(Some(dest))
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[async_trait]
impl Stage for ArchiveStage {
    fn kind(&self) -> StageKind {
        StageKind::Archive
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageReport, StageError> {
        let mut outputs = Vec::new();
        let ids: Vec<ProductId> = std::iter::once(ProductId::Precipitation)
            .chain(ctx.scales.iter().map(|s| ProductId::DroughtIndex(*s)))
            .collect();

        for id in ids {
            if let Some(archive) = self.archive_one(id, ctx).await? {
                outputs.push(archive);
            }
        }

        info!(archives = outputs.len(), "Archives built");
        Ok(StageReport {
            detail: Some(format!("{} archives", outputs.len())),
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalibrationWindow;
    use crate::config::PathsConfig;
    use crate::orchestrator::DateRange;
    use crate::products::ProductsConfig;
    use chrono::NaiveDate;
    use std::io::Read;
    use tempfile::TempDir;

    fn context(scales: Vec<u32>) -> StageContext {
        StageContext {
            run_id: "run-1".to_string(),
            today: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            range: DateRange::single(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()),
            window: CalibrationWindow {
                end_year: 2024,
                end_month: "mar".to_string(),
            },
            paths: PathsConfig::default(),
            scales,
        }
    }

    fn write(path: &Path, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_bundle_to_bytes_uses_base_names() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("nested/a.tif");
        let b = dir.path().join("b.tif");
        write(&a, b"first");
        write(&b, b"second");

        let bytes = bundle_to_bytes(&[a, b]).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("a.tif")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first");
    }

    #[test]
    fn test_bundle_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = bundle_to_bytes(&[dir.path().join("gone.tif")]).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingSource { .. }));
    }

    #[tokio::test]
    async fn test_stage_skips_missing_index_products() {
        let dir = TempDir::new().unwrap();
        let catalog = ProductCatalog::new(dir.path(), ProductsConfig::default(), vec![1, 3]);
        let ctx = context(vec![1, 3]);

        write(
            &catalog.file_for(ProductId::Precipitation, &ctx.window).unwrap(),
            b"ptm",
        );
        write(
            &catalog.file_for(ProductId::DroughtIndex(3), &ctx.window).unwrap(),
            b"spi3",
        );

        let report = ArchiveStage::new(catalog).run(&ctx).await.unwrap();
        assert_eq!(
            report.outputs,
            vec![
                dir.path().join("EHCPA_PTM_Data.zip"),
                dir.path().join("EHCPA_SPI_scale_3.zip"),
            ]
        );
        assert!(!dir.path().join("EHCPA_SPI_scale_1.zip").exists());
    }

    #[tokio::test]
    async fn test_stage_requires_precipitation() {
        let dir = TempDir::new().unwrap();
        let catalog = ProductCatalog::new(dir.path(), ProductsConfig::default(), vec![1]);
        let err = ArchiveStage::new(catalog).run(&context(vec![1])).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::Archive(ArchiveError::MissingSource { .. })
        ));
    }
}
