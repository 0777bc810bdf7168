//! `semantic_embed` job runner (§4.5): batch-embeds a photo-id list
//! under the project's canonical model. Idempotent, restart-safe
//! (resumes from the job row's checkpointed `processed` index into the
//! same deterministic photo-id list), and isolates per-photo failures.

use std::sync::Arc;

use aperture_job_system::{ControlSignal, JobHandle, JobKind, JobOutcome, JobRunner, JobSystemError};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::codec::{encode_f16, l2_normalize};
use crate::encoder::ImageEncoder;

/// Default checkpoint cadence (§4.5: "every N photos, default 10").
pub const DEFAULT_CHECKPOINT_INTERVAL: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticEmbedConfig {
    pub photo_ids: Vec<i64>,
    pub model: String,
    #[serde(default)]
    pub force_recompute: bool,
    #[serde(default)]
    pub save_progress_interval: Option<u32>,
}

pub struct SemanticEmbedRunner {
    db: DatabaseConnection,
    encoder: Arc<dyn ImageEncoder>,
}

impl SemanticEmbedRunner {
    pub fn new(db: DatabaseConnection, encoder: Arc<dyn ImageEncoder>) -> Self {
        Self { db, encoder }
    }

    async fn asset_content_hash(&self, photo_id: i64) -> Result<Option<String>, JobSystemError> {
        let Some(instance) = aperture_db::MediaInstance::find()
            .filter(aperture_db::media_instance::Column::PhotoId.eq(photo_id))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        Ok(aperture_db::MediaAsset::find_by_id(instance.asset_id).one(&self.db).await?.map(|a| a.content_hash))
    }
}

#[async_trait]
impl JobRunner for SemanticEmbedRunner {
    fn kind(&self) -> JobKind {
        JobKind::SemanticEmbed
    }

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError> {
        let job_row = aperture_db::MlJob::find_by_id(handle.job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(handle.job_id))?;
        let config: SemanticEmbedConfig = serde_json::from_str(&job_row.config_json)?;

        let project = aperture_db::Project::find_by_id(handle.project_id)
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(handle.job_id))?;
        if config.model != project.semantic_model {
            return Err(JobSystemError::NoRunner(format!(
                "model mismatch: requested `{}`, project canonical is `{}`",
                config.model, project.semantic_model
            )));
        }

        let checkpoint_every = config.save_progress_interval.unwrap_or(DEFAULT_CHECKPOINT_INTERVAL).max(1);
        let total = config.photo_ids.len() as u64;
        let resume_from = (job_row.processed as usize).min(config.photo_ids.len());

        let mut embedded = 0u64;
        let mut skipped = 0u64;
        let mut failed = 0u64;

        for (offset, &photo_id) in config.photo_ids[resume_from..].iter().enumerate() {
            let i = resume_from + offset;

            match handle.poll_control() {
                ControlSignal::Cancel => return Ok(JobOutcome::Canceled),
                ControlSignal::Pause => return Ok(JobOutcome::Paused),
                ControlSignal::Run => {}
            }

            let Some(content_hash) = self.asset_content_hash(photo_id).await? else {
                skipped += 1;
                continue;
            };

            if !config.force_recompute {
                let existing = aperture_db::SemanticEmbedding::find()
                    .filter(aperture_db::semantic_embedding::Column::PhotoId.eq(photo_id))
                    .filter(aperture_db::semantic_embedding::Column::Model.eq(&config.model))
                    .one(&self.db)
                    .await?;
                if let Some(row) = existing {
                    if row.source_hash == content_hash {
                        skipped += 1;
                        continue;
                    }
                }
            }

            let Some(photo) = aperture_db::PhotoMetadata::find_by_id(photo_id).one(&self.db).await? else {
                skipped += 1;
                continue;
            };

            match self.encoder.encode_image(std::path::Path::new(&photo.path)).await {
                Ok(mut vector) => {
                    l2_normalize(&mut vector);
                    let (blob, dim) = encode_f16(&vector);
                    let active = aperture_db::semantic_embedding::ActiveModel {
                        photo_id: Set(photo_id),
                        model: Set(config.model.clone()),
                        embedding: Set(blob),
                        dim: Set(dim),
                        source_hash: Set(content_hash),
                        source_mtime: Set(chrono::Utc::now()),
                    };
                    aperture_db::SemanticEmbedding::insert(active)
                        .on_conflict(
                            sea_orm::sea_query::OnConflict::columns([
                                aperture_db::semantic_embedding::Column::PhotoId,
                                aperture_db::semantic_embedding::Column::Model,
                            ])
                            .update_columns([
                                aperture_db::semantic_embedding::Column::Embedding,
                                aperture_db::semantic_embedding::Column::Dim,
                                aperture_db::semantic_embedding::Column::SourceHash,
                                aperture_db::semantic_embedding::Column::SourceMtime,
                            ])
                            .to_owned(),
                        )
                        .exec(&self.db)
                        .await?;
                    embedded += 1;
                }
                Err(e) => {
                    tracing::warn!(photo_id, error = e, "semantic_embed: encoder failed, isolating photo");
                    failed += 1;
                }
            }

            if (i as u32 + 1) % checkpoint_every == 0 || i as u64 + 1 == total {
                handle.checkpoint(i as u64 + 1, total, "embedding photos".to_string()).await?;
            }
        }

        Ok(JobOutcome::Completed(serde_json::json!({ "generated": embedded, "skipped": skipped, "failed": failed })))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use aperture_job_system::JobManager;

    use super::*;
    use crate::test_support::*;

    struct StubImageEncoder {
        model: &'static str,
        vector: Vec<f32>,
    }

    #[async_trait]
    impl ImageEncoder for StubImageEncoder {
        fn model_name(&self) -> &str {
            self.model
        }

        fn dim(&self) -> usize {
            self.vector.len()
        }

        async fn encode_image(&self, _path: &std::path::Path) -> Result<Vec<f32>, String> {
            Ok(self.vector.clone())
        }
    }

    async fn wait_for_terminal(db: &DatabaseConnection, job_id: uuid::Uuid) -> aperture_db::ml_job::Model {
        for _ in 0..100 {
            let row = aperture_db::MlJob::find_by_id(job_id.to_string()).one(db).await.expect("query").expect("row");
            if row.state.is_terminal() {
                return row;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {job_id} never reached a terminal state");
    }

    #[tokio::test]
    async fn embeds_photos_and_skips_already_current() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let fresh = seed_photo(&db, project_id, "/root/a.jpg").await;
        let already_embedded = seed_photo(&db, project_id, "/root/b.jpg").await;

        let content_hash = asset_content_hash(&db, already_embedded).await;
        let (blob, dim) = crate::codec::encode_f16(&[1.0, 0.0, 0.0]);
        aperture_db::semantic_embedding::ActiveModel {
            photo_id: Set(already_embedded),
            model: Set("clip-vit-b32".to_string()),
            embedding: Set(blob),
            dim: Set(dim),
            source_hash: Set(content_hash),
            source_mtime: Set(chrono::Utc::now()),
        }
        .insert(&db)
        .await
        .expect("seed existing embedding");

        let encoder: Arc<dyn ImageEncoder> =
            Arc::new(StubImageEncoder { model: "clip-vit-b32", vector: vec![1.0, 0.0, 0.0] });
        let store = aperture_actions::init_with_defaults();
        let runners: Vec<Arc<dyn JobRunner>> = vec![Arc::new(SemanticEmbedRunner::new(db.clone(), encoder))];
        let jobs = JobManager::new(db.clone(), store, runners, Some(1));

        let config = SemanticEmbedConfig {
            photo_ids: vec![fresh, already_embedded],
            model: "clip-vit-b32".to_string(),
            force_recompute: false,
            save_progress_interval: None,
        };
        let job_id = jobs
            .enqueue(project_id, JobKind::SemanticEmbed, serde_json::to_value(config).unwrap())
            .await
            .expect("enqueue");

        let finished = wait_for_terminal(&db, job_id).await;
        assert_eq!(finished.state, aperture_db::ml_job::JobState::Done);

        let rows = aperture_db::SemanticEmbedding::find()
            .filter(aperture_db::semantic_embedding::Column::Model.eq("clip-vit-b32"))
            .all(&db)
            .await
            .expect("query embeddings");
        assert_eq!(rows.len(), 2, "fresh photo gets embedded, already-current one stays as-is");
    }

    #[tokio::test]
    async fn rejects_config_model_mismatched_with_project_canonical() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let photo_id = seed_photo(&db, project_id, "/root/a.jpg").await;

        let encoder: Arc<dyn ImageEncoder> =
            Arc::new(StubImageEncoder { model: "clip-vit-l14", vector: vec![1.0, 0.0, 0.0] });
        let store = aperture_actions::init_with_defaults();
        let runners: Vec<Arc<dyn JobRunner>> = vec![Arc::new(SemanticEmbedRunner::new(db.clone(), encoder))];
        let jobs = JobManager::new(db.clone(), store, runners, Some(1));

        let config = SemanticEmbedConfig {
            photo_ids: vec![photo_id],
            model: "clip-vit-l14".to_string(),
            force_recompute: false,
            save_progress_interval: None,
        };
        let job_id = jobs
            .enqueue(project_id, JobKind::SemanticEmbed, serde_json::to_value(config).unwrap())
            .await
            .expect("enqueue");

        let finished = wait_for_terminal(&db, job_id).await;
        assert_eq!(finished.state, aperture_db::ml_job::JobState::Failed);
    }
}
