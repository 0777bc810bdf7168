//! `faces_detect` job runner (§4.4): scans a resolved set of photos,
//! runs the detector, and persists one ungrouped face-crop row per
//! detection. Idempotent on `(path, mtime, detector_version)`.

use std::sync::Arc;

use aperture_job_system::{ControlSignal, JobHandle, JobKind, JobOutcome, JobRunner, JobSystemError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::detector::{FaceDetector, LOW_CONFIDENCE_THRESHOLD};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectScope {
    All,
    Folder { id: i64 },
    Dates { from: DateTime<Utc>, to: DateTime<Utc> },
    QuantityPct { pct: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacesDetectConfig {
    pub scope: DetectScope,
}

pub struct FacesDetectRunner {
    db: DatabaseConnection,
    detector: Arc<dyn FaceDetector>,
}

impl FacesDetectRunner {
    pub fn new(db: DatabaseConnection, detector: Arc<dyn FaceDetector>) -> Self {
        Self { db, detector }
    }

    async fn resolve_scope(&self, project_id: i64, scope: &DetectScope) -> Result<Vec<aperture_db::photo_metadata::Model>, JobSystemError> {
        let mut query = aperture_db::PhotoMetadata::find().filter(aperture_db::photo_metadata::Column::ProjectId.eq(project_id));
        query = match scope {
            DetectScope::All => query,
            DetectScope::Folder { id } => query.filter(aperture_db::photo_metadata::Column::FolderId.eq(*id)),
            DetectScope::Dates { from, to } => query
                .filter(aperture_db::photo_metadata::Column::DateTaken.gte(*from))
                .filter(aperture_db::photo_metadata::Column::DateTaken.lte(*to)),
            DetectScope::QuantityPct { .. } => query,
        };

        let mut photos = query.all(&self.db).await?;
        if let DetectScope::QuantityPct { pct } = scope {
            let take = ((photos.len() as f64) * pct.clamp(0.0, 100.0) / 100.0).round() as usize;
            photos.truncate(take);
        }
        Ok(photos)
    }
}

#[async_trait]
impl JobRunner for FacesDetectRunner {
    fn kind(&self) -> JobKind {
        JobKind::FacesDetect
    }

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError> {
        let job_row = aperture_db::MlJob::find_by_id(handle.job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(handle.job_id))?;
        let config: FacesDetectConfig = serde_json::from_str(&job_row.config_json)?;

        let photos = self.resolve_scope(handle.project_id, &config.scope).await?;
        let total = photos.len() as u64;
        let mut detected = 0u64;
        let mut skipped = 0u64;

        for (i, photo) in photos.iter().enumerate() {
            match handle.poll_control() {
                ControlSignal::Cancel => return Ok(JobOutcome::Canceled),
                ControlSignal::Pause => return Ok(JobOutcome::Paused),
                ControlSignal::Run => {}
            }

            let existing_for_version = aperture_db::FaceCrop::find()
                .filter(aperture_db::face_crop::Column::PhotoId.eq(photo.id))
                .filter(aperture_db::face_crop::Column::DetectorVersion.eq(self.detector.version()))
                .all(&self.db)
                .await?;
            if !existing_for_version.is_empty() {
                skipped += 1;
                continue;
            }

            let path = std::path::Path::new(&photo.path);
            match self.detector.detect(path).await {
                Ok(raw_detections) => {
                    for raw in raw_detections {
                        let active = aperture_db::face_crop::ActiveModel {
                            id: sea_orm::ActiveValue::NotSet,
                            project_id: Set(handle.project_id),
                            photo_id: Set(photo.id),
                            branch_key: Set(None),
                            image_path: Set(photo.path.clone()),
                            crop_path: Set(None),
                            embedding: Set(None),
                            confidence: Set(raw.confidence),
                            low_confidence: Set(raw.confidence < LOW_CONFIDENCE_THRESHOLD),
                            bbox_top: Set(raw.bbox_top),
                            bbox_right: Set(raw.bbox_right),
                            bbox_bottom: Set(raw.bbox_bottom),
                            bbox_left: Set(raw.bbox_left),
                            is_representative: Set(false),
                            detector_version: Set(self.detector.version().to_string()),
                        };
                        active.insert(&self.db).await?;
                        detected += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %photo.path, error = e, "faces_detect: detector failed for photo");
                    skipped += 1;
                }
            }

            if i % 10 == 0 || i as u64 + 1 == total {
                handle.checkpoint(i as u64 + 1, total, "detecting faces".to_string()).await?;
            }
        }

        Ok(JobOutcome::Completed(serde_json::json!({ "detected": detected, "skipped": skipped })))
    }
}
