//! MTP/portable-device import (§4.2): the device API is apartment-
//! threaded and exposes no random-access reads, so files are first
//! copied into a scratch directory. The copy call itself is async with
//! no reliable completion event, so the worker polls with a per-file
//! timeout rather than blocking on it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aperture_job_system::{ControlSignal, JobHandle, JobOutcome, JobRunner, JobSystemError, JobKind};
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::derive::derive_file;

/// Per-file MTP copy timeout (§4.2, §7 timeouts table).
pub const MTP_COPY_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A handle to one device file mid-copy. `poll` returns `Some` once the
/// underlying async copy has either landed the file at `dest` or
/// failed; `None` means "still copying".
#[async_trait]
pub trait MtpCopyHandle: Send + Sync {
    async fn poll(&mut self) -> Option<Result<(), String>>;
}

/// Abstraction over a device's file listing and copy-out operation.
/// The engine crate supplies the concrete platform binding; this crate
/// only needs the scratch-copy worker loop to be generic over it so it
/// compiles and is testable without a real device attached.
#[async_trait]
pub trait MtpSource: Send + Sync {
    /// Every media file currently visible on the device, as a
    /// device-relative path string (device paths are not real
    /// filesystem paths and cannot be `Path`s).
    async fn list_files(&self) -> Result<Vec<String>, String>;

    /// Begin an asynchronous copy of `device_path` into `dest`.
    /// Returns immediately with a handle to poll for completion.
    async fn begin_copy(&self, device_path: &str, dest: &Path) -> Result<Box<dyn MtpCopyHandle>, String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtpCopyConfig {
    pub scratch_dir: String,
}

pub struct MtpCopyRunner {
    db: DatabaseConnection,
    source: Arc<dyn MtpSource>,
}

impl MtpCopyRunner {
    pub fn new(db: DatabaseConnection, source: Arc<dyn MtpSource>) -> Self {
        Self { db, source }
    }
}

#[async_trait]
impl JobRunner for MtpCopyRunner {
    fn kind(&self) -> JobKind {
        JobKind::MtpCopy
    }

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError> {
        let job_row = aperture_db::MlJob::find_by_id(handle.job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(handle.job_id))?;
        let config: MtpCopyConfig = serde_json::from_str(&job_row.config_json)?;
        let scratch = PathBuf::from(&config.scratch_dir);
        tokio::fs::create_dir_all(&scratch).await.ok();

        let device_files = self
            .source
            .list_files()
            .await
            .map_err(|e| JobSystemError::NoRunner(format!("mtp list_files failed: {e}")))?;
        let total = device_files.len() as u64;

        let mut copied = 0u64;
        let mut failed = 0u64;

        for (i, device_path) in device_files.iter().enumerate() {
            match handle.poll_control() {
                ControlSignal::Cancel => return Ok(JobOutcome::Canceled),
                ControlSignal::Pause => return Ok(JobOutcome::Paused),
                ControlSignal::Run => {}
            }

            let file_name = device_path.rsplit('/').next().unwrap_or(device_path);
            let dest = scratch.join(file_name);

            match copy_with_timeout(self.source.as_ref(), device_path, &dest).await {
                Ok(()) => {
                    let ruler = aperture_indexer_rules::IndexerRuler::default();
                    if let Some(walked) = crate::walker::walk(&scratch, &ruler).into_iter().find(|f| f.path == dest) {
                        match derive_file(&self.db, handle.project_id, &scratch, &walked, false).await {
                            Ok(_) => copied += 1,
                            Err(e) => {
                                tracing::warn!(path = %dest.display(), error = %e, "mtp_copy: derivation failed after copy");
                                failed += 1;
                            }
                        }
                    } else {
                        failed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(device_path, error = %e, "mtp_copy: copy failed or timed out, file isolated");
                    failed += 1;
                }
            }

            handle
                .checkpoint(i as u64 + 1, total, format!("copying {file_name} from device"))
                .await?;
        }

        Ok(JobOutcome::Completed(serde_json::json!({ "copied": copied, "failed": failed })))
    }
}

async fn copy_with_timeout(source: &dyn MtpSource, device_path: &str, dest: &Path) -> Result<(), String> {
    let mut handle = source.begin_copy(device_path, dest).await?;
    let deadline = tokio::time::Instant::now() + MTP_COPY_TIMEOUT;

    loop {
        if let Some(result) = handle.poll().await {
            return result;
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(format!("mtp copy of {device_path} timed out after {}s", MTP_COPY_TIMEOUT.as_secs()));
        }
        sleep(POLL_INTERVAL).await;
    }
}
