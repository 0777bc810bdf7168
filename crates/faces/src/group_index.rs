//! `group_index` job (§4.7, §3 Person group): rebuilds a person group's
//! materialized AND-match cache — the set of photos containing *every*
//! member branch_key — wholesale. Never patched incrementally; a
//! membership change just marks the group `stale` and the next
//! `group_index` run recomputes from scratch.

use std::collections::HashSet;
use std::sync::Arc;

use aperture_job_system::{JobHandle, JobKind, JobOutcome, JobRunner, JobSystemError};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupIndexConfig {
    pub group_id: i64,
}

pub struct GroupIndexRunner {
    db: DatabaseConnection,
}

impl GroupIndexRunner {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobRunner for GroupIndexRunner {
    fn kind(&self) -> JobKind {
        JobKind::GroupIndex
    }

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError> {
        let job_row = aperture_db::MlJob::find_by_id(handle.job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(handle.job_id))?;
        let config: GroupIndexConfig = serde_json::from_str(&job_row.config_json)?;

        let members = aperture_db::PersonGroupMember::find()
            .filter(aperture_db::person_group_member::Column::GroupId.eq(config.group_id))
            .all(&self.db)
            .await?;

        let mut intersection: Option<HashSet<i64>> = None;
        for member in &members {
            let photo_ids: Vec<i64> = aperture_db::FaceCrop::find()
                .filter(aperture_db::face_crop::Column::BranchKey.eq(member.branch_key.clone()))
                .select_only()
                .column(aperture_db::face_crop::Column::PhotoId)
                .into_tuple()
                .all(&self.db)
                .await?;
            let set: HashSet<i64> = photo_ids.into_iter().collect();
            intersection = Some(match intersection {
                None => set,
                Some(prev) => prev.intersection(&set).copied().collect(),
            });
        }
        let matches = intersection.unwrap_or_default();

        let txn = aperture_db::begin_immediate(&self.db).await?;
        aperture_db::PersonGroupMatchCache::delete_many()
            .filter(aperture_db::person_group_match_cache::Column::GroupId.eq(config.group_id))
            .exec(&txn)
            .await?;
        for &photo_id in &matches {
            aperture_db::person_group_match_cache::ActiveModel { group_id: Set(config.group_id), photo_id: Set(photo_id) }
                .insert(&txn)
                .await?;
        }
        if let Some(group) = aperture_db::PersonGroup::find_by_id(config.group_id).one(&txn).await? {
            let mut active: aperture_db::person_group::ActiveModel = group.into();
            active.stale = Set(false);
            active.update(&txn).await?;
        }
        txn.commit().await?;

        handle.checkpoint(1, 1, "rebuilt group match cache".to_string()).await?;

        Ok(JobOutcome::Completed(serde_json::json!({
            "group_id": config.group_id,
            "match_count": matches.len() as u64,
            "scope": "all_members",
        })))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use aperture_job_system::{JobKind, JobManager};
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

    use super::*;

    async fn test_db() -> DatabaseConnection {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let db = aperture_db::connect(file.path()).await.expect("connect");
        aperture_migration::run(&db).await.expect("migrate");
        std::mem::forget(file); // keep the backing file alive for the pool's lifetime
        db
    }

    async fn seed_project(db: &DatabaseConnection) -> i64 {
        let project = aperture_db::project::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            name: Set("test".to_string()),
            root_folder: Set("/root".to_string()),
            mode: Set("local".to_string()),
            semantic_model: Set("clip-vit-b32".to_string()),
            face_eps: Set(0.35),
            face_min_samples: Set(3),
            created_at: Set(Utc::now()),
        };
        project.insert(db).await.expect("insert project").id
    }

    // `(parent_id, name)` is unique, so every photo in a test shares
    // the single root folder rather than each creating its own.
    async fn root_folder_id(db: &DatabaseConnection) -> i64 {
        if let Some(existing) = aperture_db::PhotoFolder::find().one(db).await.expect("query folder") {
            return existing.id;
        }
        let folder = aperture_db::photo_folder::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            parent_id: Set(None),
            path: Set("/root".to_string()),
            name: Set("root".to_string()),
        };
        folder.insert(db).await.expect("insert folder").id
    }

    async fn seed_photo(db: &DatabaseConnection, project_id: i64, path: &str) -> i64 {
        let folder_id = root_folder_id(db).await;

        let photo = aperture_db::photo_metadata::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            path: Set(path.to_string()),
            folder_id: Set(folder_id),
            project_id: Set(project_id),
            size_kb: Set(100),
            modified: Set(Utc::now()),
            date_taken: Set(None),
            created_ts: Set(Utc::now()),
            created_year: Set(2026),
            created_month: Set(1),
            created_day: Set(1),
            width: Set(None),
            height: Set(None),
            rating: Set(None),
            favorite: Set(false),
            missing: Set(false),
            metadata_fail_count: Set(0),
            last_error: Set(None),
            faces_status: Set("done".to_string()),
            embed_status: Set("pending".to_string()),
        };
        photo.insert(db).await.expect("insert photo").id
    }

    async fn seed_face_crop(db: &DatabaseConnection, project_id: i64, photo_id: i64, branch_key: &str) {
        let crop = aperture_db::face_crop::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            project_id: Set(project_id),
            photo_id: Set(photo_id),
            branch_key: Set(Some(branch_key.to_string())),
            image_path: Set(format!("/root/photo_{photo_id}.jpg")),
            crop_path: Set(None),
            embedding: Set(None),
            confidence: Set(0.9),
            low_confidence: Set(false),
            bbox_top: Set(0.0),
            bbox_right: Set(1.0),
            bbox_bottom: Set(1.0),
            bbox_left: Set(0.0),
            is_representative: Set(false),
            detector_version: Set("v1".to_string()),
        };
        crop.insert(db).await.expect("insert face crop");
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
    async fn rebuilds_intersection_of_member_branches() {
        let db = test_db().await;
        let project_id = seed_project(&db).await;

        // photo_a has both faces, photo_b only has branch_1.
        let photo_a = seed_photo(&db, project_id, "/root/a.jpg").await;
        let photo_b = seed_photo(&db, project_id, "/root/b.jpg").await;
        seed_face_crop(&db, project_id, photo_a, "face_001").await;
        seed_face_crop(&db, project_id, photo_a, "face_002").await;
        seed_face_crop(&db, project_id, photo_b, "face_001").await;

        let group = aperture_db::person_group::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            project_id: Set(project_id),
            name: Set("couple".to_string()),
            stale: Set(true),
        };
        let group_id = group.insert(&db).await.expect("insert group").id;

        for branch_key in ["face_001", "face_002"] {
            aperture_db::person_group_member::ActiveModel {
                group_id: Set(group_id),
                branch_key: Set(branch_key.to_string()),
            }
            .insert(&db)
            .await
            .expect("insert member");
        }

        let store = aperture_actions::init_with_defaults();
        let runners: Vec<std::sync::Arc<dyn aperture_job_system::JobRunner>> =
            vec![std::sync::Arc::new(GroupIndexRunner::new(db.clone()))];
        let jobs = JobManager::new(db.clone(), store, runners, Some(1));

        let config = GroupIndexConfig { group_id };
        let job_id = jobs
            .enqueue(project_id, JobKind::GroupIndex, serde_json::to_value(config).unwrap())
            .await
            .expect("enqueue");

        let finished = wait_for_terminal(&db, job_id).await;
        assert_eq!(finished.state, aperture_db::ml_job::JobState::Done);

        let cached = aperture_db::PersonGroupMatchCache::find()
            .filter(aperture_db::person_group_match_cache::Column::GroupId.eq(group_id))
            .all(&db)
            .await
            .expect("query cache");
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].photo_id, photo_a);

        let group = aperture_db::PersonGroup::find_by_id(group_id).one(&db).await.expect("query group").unwrap();
        assert!(!group.stale);
    }

    #[tokio::test]
    async fn empty_group_has_empty_match_set() {
        let db = test_db().await;
        let project_id = seed_project(&db).await;

        let group = aperture_db::person_group::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            project_id: Set(project_id),
            name: Set("nobody".to_string()),
            stale: Set(true),
        };
        let group_id = group.insert(&db).await.expect("insert group").id;

        let store = aperture_actions::init_with_defaults();
        let runners: Vec<std::sync::Arc<dyn aperture_job_system::JobRunner>> =
            vec![std::sync::Arc::new(GroupIndexRunner::new(db.clone()))];
        let jobs = JobManager::new(db.clone(), store, runners, Some(1));

        let config = GroupIndexConfig { group_id };
        let job_id = jobs
            .enqueue(project_id, JobKind::GroupIndex, serde_json::to_value(config).unwrap())
            .await
            .expect("enqueue");

        let finished = wait_for_terminal(&db, job_id).await;
        assert_eq!(finished.state, aperture_db::ml_job::JobState::Done);

        let cached = aperture_db::PersonGroupMatchCache::find()
            .filter(aperture_db::person_group_match_cache::Column::GroupId.eq(group_id))
            .all(&db)
            .await
            .expect("query cache");
        assert!(cached.is_empty());
    }
}
