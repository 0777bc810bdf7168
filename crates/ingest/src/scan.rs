//! `scan` job runner (§4.2): walks a project's root folder, derives
//! every supported file, and checkpoints progress as it goes.

use std::sync::Arc;

use aperture_job_system::{ControlSignal, JobHandle, JobOutcome, JobRunner, JobSystemError, JobKind};
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};

use crate::derive::derive_file;
use crate::walker::walk;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub root: String,
    /// Incremental scans skip files whose `(size, mtime)` match the
    /// stored row; a full scan re-derives everything (§4.2).
    #[serde(default)]
    pub incremental: bool,
}

#[derive(Debug, Default, Serialize)]
struct ScanStats {
    photos_indexed: u64,
    videos_indexed: u64,
    skipped: u64,
    failed: u64,
}

pub struct ScanRunner {
    db: DatabaseConnection,
}

impl ScanRunner {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobRunner for ScanRunner {
    fn kind(&self) -> JobKind {
        JobKind::Scan
    }

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError> {
        let job_row = aperture_db::MlJob::find_by_id(handle.job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(handle.job_id))?;
        let config: ScanConfig = serde_json::from_str(&job_row.config_json)?;
        let root = std::path::Path::new(&config.root);

        let project = aperture_db::Project::find_by_id(handle.project_id)
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(handle.job_id))?;
        let _ = project; // reserved for per-project ignore-rule overrides

        let ruler = aperture_indexer_rules::IndexerRuler::default();
        let files = tokio::task::spawn_blocking({
            let root = root.to_path_buf();
            move || walk(&root, &ruler)
        })
        .await
        .expect("walker task panicked");

        let total = files.len() as u64;
        let mut stats = ScanStats::default();

        for (i, file) in files.iter().enumerate() {
            match handle.poll_control() {
                ControlSignal::Cancel => return Ok(JobOutcome::Canceled),
                ControlSignal::Pause => return Ok(JobOutcome::Paused),
                ControlSignal::Run => {}
            }

            let outcome = derive_file(&self.db, handle.project_id, root, file, config.incremental).await;
            match outcome {
                Ok(o) if o.skipped => stats.skipped += 1,
                Ok(o) if o.failed => stats.failed += 1,
                Ok(o) if o.is_video => stats.videos_indexed += 1,
                Ok(_) => stats.photos_indexed += 1,
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "scan: unrecoverable per-file error");
                    stats.failed += 1;
                }
            }

            if i % 25 == 0 || i as u64 + 1 == total {
                handle
                    .checkpoint(i as u64 + 1, total, format!("scanning {}", file.path.display()))
                    .await?;
            }
        }

        Ok(JobOutcome::Completed(serde_json::to_value(&stats).expect("stats always serialize")))
    }
}
