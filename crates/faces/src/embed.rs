//! `faces_embed` job runner (§4.4): fills in `embedding` for any
//! face-crop row that doesn't have one yet.

use std::sync::Arc;

use aperture_job_system::{ControlSignal, JobHandle, JobKind, JobOutcome, JobRunner, JobSystemError};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::codec::encode;
use crate::detector::FaceEmbedder;

pub struct FacesEmbedRunner {
    db: DatabaseConnection,
    embedder: Arc<dyn FaceEmbedder>,
}

impl FacesEmbedRunner {
    pub fn new(db: DatabaseConnection, embedder: Arc<dyn FaceEmbedder>) -> Self {
        Self { db, embedder }
    }
}

#[async_trait]
impl JobRunner for FacesEmbedRunner {
    fn kind(&self) -> JobKind {
        JobKind::FacesEmbed
    }

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError> {
        let pending = aperture_db::FaceCrop::find()
            .filter(aperture_db::face_crop::Column::ProjectId.eq(handle.project_id))
            .filter(aperture_db::face_crop::Column::Embedding.is_null())
            .all(&self.db)
            .await?;

        let total = pending.len() as u64;
        let mut embedded = 0u64;
        let mut failed = 0u64;

        for (i, crop) in pending.iter().enumerate() {
            match handle.poll_control() {
                ControlSignal::Cancel => return Ok(JobOutcome::Canceled),
                ControlSignal::Pause => return Ok(JobOutcome::Paused),
                ControlSignal::Run => {}
            }

            let bbox = (crop.bbox_top, crop.bbox_right, crop.bbox_bottom, crop.bbox_left);
            match self.embedder.embed(std::path::Path::new(&crop.image_path), bbox).await {
                Ok(vector) => {
                    let mut active: aperture_db::face_crop::ActiveModel = crop.clone().into();
                    active.embedding = Set(Some(encode(&vector)));
                    active.update(&self.db).await?;
                    embedded += 1;
                }
                Err(e) => {
                    tracing::warn!(crop_id = crop.id, error = e, "faces_embed: embedder failed for crop");
                    failed += 1;
                }
            }

            if i % 25 == 0 || i as u64 + 1 == total {
                handle.checkpoint(i as u64 + 1, total, "embedding faces".to_string()).await?;
            }
        }

        Ok(JobOutcome::Completed(serde_json::json!({ "embedded": embedded, "failed": failed })))
    }
}
