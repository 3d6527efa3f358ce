//! Completion signal between stages: declared outputs must exist and stop
//! growing before the next stage may read them.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

use super::error::StageError;

/// Waits until every path exists as a file whose size is unchanged across
/// two consecutive checks `poll` apart.
pub async fn wait_until_ready(
    paths: &[PathBuf],
    timeout: Duration,
    poll: Duration,
) -> Result<(), StageError> {
    let deadline = Instant::now() + timeout;
    for path in paths {
        wait_for_file(path, deadline, poll).await?;
    }
    Ok(())
}

async fn wait_for_file(path: &Path, deadline: Instant, poll: Duration) -> Result<(), StageError> {
    let mut last_size: Option<u64> = None;

    loop {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Some(meta.len()),
            _ => None,
        };

        if let (Some(now), Some(before)) = (size, last_size) {
            if now == before {
                debug!(path = %path.display(), size = now, "Output ready");
                return Ok(());
            }
        }
        last_size = size;

        if Instant::now() >= deadline {
            return Err(StageError::OutputNotReady {
                path: path.to_path_buf(),
            });
        }
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_existing_stable_file_is_ready() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.tif");
        std::fs::write(&path, b"raster").unwrap();

        wait_until_ready(
            &[path],
            Duration::from_secs(1),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.tif");

        let err = wait_until_ready(
            &[path.clone()],
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StageError::OutputNotReady { path: p } if p == path));
    }

    #[tokio::test]
    async fn test_late_file_becomes_ready() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.nc");
        let writer_path = path.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tokio::fs::write(writer_path, b"done").await.unwrap();
        });

        wait_until_ready(
            &[path],
            Duration::from_secs(2),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_empty_list_is_ready() {
        wait_until_ready(&[], Duration::from_millis(1), Duration::from_millis(1))
            .await
            .unwrap();
    }
}
