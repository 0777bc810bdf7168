//! `duplicate_hash` job runner: backfills `perceptual_hash` for any
//! asset that doesn't have one yet. Ordinary scans already compute it
//! per photo (§4.2), so this mainly catches assets derived before a
//! perceptual-hash bug fix or a schema migration that added the column.

use std::sync::Arc;

use aperture_job_system::{ControlSignal, JobHandle, JobKind, JobOutcome, JobRunner, JobSystemError};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

pub struct DuplicateHashRunner {
    db: DatabaseConnection,
}

impl DuplicateHashRunner {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobRunner for DuplicateHashRunner {
    fn kind(&self) -> JobKind {
        JobKind::DuplicateHash
    }

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError> {
        let missing = aperture_db::MediaAsset::find()
            .filter(aperture_db::media_asset::Column::ProjectId.eq(handle.project_id))
            .filter(aperture_db::media_asset::Column::PerceptualHash.is_null())
            .all(&self.db)
            .await?;

        let total = missing.len() as u64;
        let mut hashed = 0u64;
        let mut skipped = 0u64;

        for (i, asset) in missing.iter().enumerate() {
            match handle.poll_control() {
                ControlSignal::Cancel => return Ok(JobOutcome::Canceled),
                ControlSignal::Pause => return Ok(JobOutcome::Paused),
                ControlSignal::Run => {}
            }

            let Some(photo) = aperture_db::PhotoMetadata::find_by_id(asset.representative_photo_id).one(&self.db).await? else {
                skipped += 1;
                continue;
            };
            let path = photo.path.clone();

            let computed = tokio::task::spawn_blocking(move || {
                image::open(&path).ok().map(|img| aperture_ingest::hash::perceptual_hash(&img) as i64)
            })
            .await
            .expect("blocking hash task panicked");

            if let Some(phash) = computed {
                let mut active: aperture_db::media_asset::ActiveModel = asset.clone().into();
                active.perceptual_hash = Set(Some(phash));
                active.update(&self.db).await?;
                hashed += 1;
            } else {
                skipped += 1;
            }

            if i % 25 == 0 || i as u64 + 1 == total {
                handle.checkpoint(i as u64 + 1, total, "backfilling perceptual hashes".to_string()).await?;
            }
        }

        Ok(JobOutcome::Completed(serde_json::json!({ "hashed": hashed, "skipped": skipped })))
    }
}
