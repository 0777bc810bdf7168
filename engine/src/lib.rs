//! Wiring root (playing the teacher's `sd-core` binding-crate role):
//! opens the store, runs migrations, builds the action/version store
//! and job manager, registers every pipeline's [`JobRunner`], and
//! exposes the public API the UI/CLI layer drives.

mod config;
mod error;
mod maintenance;

pub use config::EngineConfig;
pub use error::EngineError;
pub use maintenance::{clear_derived_caches, ClearCachesReport};

use std::sync::Arc;

use aperture_actions::{Action, Store};
use aperture_faces::{FaceDetector, FaceEmbedder};
use aperture_ingest::MtpSource;
use aperture_job_system::{JobKind, JobManager};
use aperture_semantic::{ImageEncoder, TextEncoder};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

/// The concrete platform bindings the engine has no business implementing
/// itself (§9 open question 4: model discovery is left to the UI
/// collaborator). Every field is a trait object the caller supplies.
pub struct EngineBindings {
    pub face_detector: Arc<dyn FaceDetector>,
    pub face_embedder: Arc<dyn FaceEmbedder>,
    pub image_encoder: Arc<dyn ImageEncoder>,
    pub text_encoder: Arc<dyn TextEncoder>,
    pub mtp_source: Arc<dyn MtpSource>,
}

pub struct Engine {
    db: DatabaseConnection,
    store: Arc<Store>,
    jobs: Arc<JobManager>,
    config: EngineConfig,
    text_encoder: Arc<dyn TextEncoder>,
    search_cancellation: aperture_search::SharedCancellation,
}

impl Engine {
    /// Opens the store, runs pending migrations, recovers zombie jobs
    /// left by a prior crash, and registers every pipeline's runner.
    /// Must be called once at process start, before any job is enqueued.
    pub async fn start(config: EngineConfig, bindings: EngineBindings) -> Result<Self, EngineError> {
        let db = aperture_db::connect(&config.store_path).await?;
        aperture_migration::run(&db).await?;

        let store = aperture_actions::init_with_defaults();

        let runners: Vec<Arc<dyn aperture_job_system::JobRunner>> = vec![
            Arc::new(aperture_ingest::ScanRunner::new(db.clone())),
            Arc::new(aperture_ingest::MtpCopyRunner::new(db.clone(), bindings.mtp_source.clone())),
            Arc::new(aperture_dedup::DuplicateHashRunner::new(db.clone())),
            Arc::new(aperture_dedup::DuplicateGroupRunner::new(db.clone())),
            Arc::new(aperture_faces::FacesDetectRunner::new(db.clone(), bindings.face_detector.clone())),
            Arc::new(aperture_faces::FacesEmbedRunner::new(db.clone(), bindings.face_embedder.clone())),
            Arc::new(aperture_faces::FacesClusterRunner::new(db.clone())),
            Arc::new(aperture_faces::GroupIndexRunner::new(db.clone())),
            Arc::new(aperture_semantic::SemanticEmbedRunner::new(db.clone(), bindings.image_encoder.clone())),
        ];

        let jobs = JobManager::new(db.clone(), Arc::clone(&store), runners, config.global_concurrency);
        let recovered = jobs.recover_zombies().await?;
        if recovered > 0 {
            tracing::info!(recovered, "crash recovery: zombie jobs moved to failed");
        }

        Ok(Self {
            db,
            store,
            jobs,
            text_encoder: bindings.text_encoder,
            search_cancellation: Arc::new(aperture_search::SearchCancellation::default()),
            config,
        })
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn jobs(&self) -> &Arc<JobManager> {
        &self.jobs
    }

    /// Creates a new project, seeding clustering defaults from
    /// `EngineConfig` (§9 resolved open question 3).
    pub async fn create_project(&self, name: &str, root_folder: &str) -> Result<i64, EngineError> {
        let active = aperture_db::project::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            name: Set(name.to_string()),
            root_folder: Set(root_folder.to_string()),
            mode: Set("local".to_string()),
            semantic_model: Set(self.config.default_semantic_model.clone()),
            face_eps: Set(self.config.default_face_eps),
            face_min_samples: Set(self.config.default_face_min_samples),
            created_at: Set(chrono::Utc::now()),
        };
        let model = active.insert(&self.db).await?;

        let meta = self.store.make_meta("engine");
        self.store.dispatch(Action::ProjectSelected { meta, project_id: model.id });
        Ok(model.id)
    }

    pub async fn enqueue_scan(&self, project_id: i64, root: &str, incremental: bool) -> Result<Uuid, EngineError> {
        let config = aperture_ingest::ScanConfig { root: root.to_string(), incremental };
        let job_id =
            self.jobs.enqueue(project_id, JobKind::Scan, serde_json::to_value(config).expect("config serializes")).await?;

        let meta = self.store.make_meta("engine");
        self.store.dispatch(Action::ScanStarted {
            meta,
            job_id: job_id.to_string(),
            folder_path: root.to_string(),
            incremental,
        });
        Ok(job_id)
    }

    pub async fn enqueue_mtp_copy(&self, project_id: i64, scratch_dir: &str) -> Result<Uuid, EngineError> {
        let config = aperture_ingest::MtpCopyConfig { scratch_dir: scratch_dir.to_string() };
        Ok(self.jobs.enqueue(project_id, JobKind::MtpCopy, serde_json::to_value(config).expect("config serializes")).await?)
    }

    pub async fn enqueue_duplicate_hash(&self, project_id: i64) -> Result<Uuid, EngineError> {
        Ok(self.jobs.enqueue(project_id, JobKind::DuplicateHash, serde_json::json!({})).await?)
    }

    pub async fn enqueue_duplicate_group(&self, project_id: i64) -> Result<Uuid, EngineError> {
        Ok(self.jobs.enqueue(project_id, JobKind::DuplicateGroup, serde_json::json!({})).await?)
    }

    pub async fn enqueue_faces_detect(
        &self,
        project_id: i64,
        scope: aperture_faces::DetectScope,
    ) -> Result<Uuid, EngineError> {
        let config = aperture_faces::FacesDetectConfig { scope };
        Ok(self.jobs.enqueue(project_id, JobKind::FacesDetect, serde_json::to_value(config).expect("config serializes")).await?)
    }

    pub async fn enqueue_faces_embed(&self, project_id: i64) -> Result<Uuid, EngineError> {
        Ok(self.jobs.enqueue(project_id, JobKind::FacesEmbed, serde_json::json!({})).await?)
    }

    pub async fn enqueue_faces_cluster(&self, project_id: i64) -> Result<Uuid, EngineError> {
        Ok(self.jobs.enqueue(project_id, JobKind::FacesCluster, serde_json::json!({})).await?)
    }

    /// Creates a person group, initially `stale` — its match cache is
    /// empty until the first `group_index` run.
    pub async fn create_person_group(&self, project_id: i64, name: &str) -> Result<i64, EngineError> {
        let group_id = aperture_faces::create_group(&self.db, project_id, name).await?;
        let meta = self.store.make_meta("engine");
        self.store.dispatch(Action::GroupsChanged { meta, group_id: Some(group_id), reason: "created".to_string() });
        Ok(group_id)
    }

    /// Adds a branch_key to a group's membership, invalidating its
    /// match cache (§3). The caller is expected to follow up with
    /// [`Engine::enqueue_group_index`] to rebuild it.
    pub async fn add_group_member(&self, group_id: i64, branch_key: &str) -> Result<(), EngineError> {
        aperture_faces::add_member(&self.db, group_id, branch_key).await?;
        let meta = self.store.make_meta("engine");
        self.store.dispatch(Action::GroupsChanged { meta, group_id: Some(group_id), reason: "member_added".to_string() });
        Ok(())
    }

    pub async fn remove_group_member(&self, group_id: i64, branch_key: &str) -> Result<(), EngineError> {
        aperture_faces::remove_member(&self.db, group_id, branch_key).await?;
        let meta = self.store.make_meta("engine");
        self.store.dispatch(Action::GroupsChanged { meta, group_id: Some(group_id), reason: "member_removed".to_string() });
        Ok(())
    }

    /// Enqueues the wholesale AND-match cache rebuild for a person group
    /// (§4.7). `completion_action` maps the finished job to
    /// `Action::GroupIndexCompleted`.
    pub async fn enqueue_group_index(&self, project_id: i64, group_id: i64) -> Result<Uuid, EngineError> {
        let config = aperture_faces::GroupIndexConfig { group_id };
        Ok(self
            .jobs
            .enqueue(project_id, JobKind::GroupIndex, serde_json::to_value(config).expect("config serializes"))
            .await?)
    }

    /// Enqueues `semantic_embed` for the given photo ids under the
    /// project's current canonical model. Used both for fresh ingest and
    /// for the reindex set computed after a model migration (§4.5).
    pub async fn enqueue_semantic_embed(
        &self,
        project_id: i64,
        photo_ids: Vec<i64>,
        force_recompute: bool,
    ) -> Result<Uuid, EngineError> {
        let project = aperture_db::Project::find_by_id(project_id)
            .one(&self.db)
            .await?
            .ok_or(EngineError::ProjectNotFound(project_id))?;
        let config = aperture_semantic::SemanticEmbedConfig {
            photo_ids,
            model: project.semantic_model,
            force_recompute,
            save_progress_interval: None,
        };
        Ok(self
            .jobs
            .enqueue(project_id, JobKind::SemanticEmbed, serde_json::to_value(config).expect("config serializes"))
            .await?)
    }

    /// Switches a project's canonical semantic model and returns the
    /// photo ids that now need re-embedding (caller enqueues that as a
    /// follow-up `semantic_embed` job; old embeddings are kept, not
    /// deleted, per §4.5's migration protocol).
    pub async fn migrate_semantic_model(&self, project_id: i64, new_model: &str) -> Result<Vec<i64>, EngineError> {
        let reindex = aperture_semantic::reindex_set(&self.db, project_id, new_model).await?;
        aperture_semantic::set_canonical_model(&self.db, project_id, new_model).await?;
        Ok(reindex)
    }

    pub async fn find_similar(
        &self,
        project_id: i64,
        photo_id: i64,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<aperture_search::SimilarityHit>, EngineError> {
        Ok(aperture_search::find_similar(&self.db, project_id, photo_id, top_k, threshold).await?)
    }

    /// Text -> image search. Cancels any search already in flight from
    /// this `Engine`, per §4.6's "new query supersedes the old one"
    /// contract.
    pub async fn search_text(
        &self,
        project_id: i64,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<aperture_search::SimilarityHit>, EngineError> {
        let token = self.search_cancellation.begin();
        Ok(aperture_search::search_text(
            &self.db,
            self.text_encoder.as_ref(),
            &self.search_cancellation,
            token,
            project_id,
            query,
            top_k,
            threshold,
        )
        .await?)
    }

    pub async fn unstack(&self, stack_id: i64, asset_id: i64) -> Result<(), EngineError> {
        Ok(aperture_dedup::unstack(&self.db, stack_id, asset_id).await?)
    }

    pub async fn set_stack_representative(&self, stack_id: i64, asset_id: i64) -> Result<(), EngineError> {
        Ok(aperture_dedup::set_representative(&self.db, stack_id, asset_id).await?)
    }

    pub async fn audit_face_crops(&self, project_id: i64) -> Result<aperture_faces::AuditReport, EngineError> {
        Ok(aperture_faces::audit_and_repair(&self.db, project_id).await?)
    }

    pub async fn clear_derived_caches(&self, project_id: i64) -> Result<ClearCachesReport, EngineError> {
        maintenance::clear_derived_caches(&self.db, project_id).await
    }

    pub async fn retry_job(&self, job_id: Uuid) -> Result<(), EngineError> {
        Ok(self.jobs.resume(job_id).await?)
    }

    /// Flushes the WAL sidecar into the main store file. Call once at
    /// shutdown (§4.1).
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        aperture_db::checkpoint_full(&self.db).await?;
        Ok(())
    }
}

/// Resolves every `photo_metadata` row still marked `embed_status =
/// 'pending'` for a project, used by callers wiring up an initial
/// full-index embed pass after a scan completes.
pub async fn pending_embed_photo_ids(db: &DatabaseConnection, project_id: i64) -> Result<Vec<i64>, EngineError> {
    use sea_orm::QuerySelect;
    let ids: Vec<i64> = aperture_db::PhotoMetadata::find()
        .filter(aperture_db::photo_metadata::Column::ProjectId.eq(project_id))
        .filter(aperture_db::photo_metadata::Column::EmbedStatus.eq("pending"))
        .select_only()
        .column(aperture_db::photo_metadata::Column::Id)
        .into_tuple()
        .all(db)
        .await?;
    Ok(ids)
}
