//! Person group CRUD (§3): create a group, add/remove member branch_keys.
//! Every membership change marks the group `stale` and clears its
//! materialized match cache immediately — the cache rows themselves are
//! only ever rebuilt wholesale by [`crate::group_index::GroupIndexRunner`],
//! never patched in place.

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

pub async fn create_group(db: &DatabaseConnection, project_id: i64, name: &str) -> Result<i64, sea_orm::DbErr> {
    let active = aperture_db::person_group::ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        project_id: Set(project_id),
        name: Set(name.to_string()),
        stale: Set(true),
    };
    let model = active.insert(db).await?;
    Ok(model.id)
}

pub async fn add_member(db: &DatabaseConnection, group_id: i64, branch_key: &str) -> Result<(), sea_orm::DbErr> {
    let txn = aperture_db::begin_immediate(db).await?;
    let active = aperture_db::person_group_member::ActiveModel {
        group_id: Set(group_id),
        branch_key: Set(branch_key.to_string()),
    };
    active.insert(&txn).await?;
    invalidate(&txn, group_id).await?;
    txn.commit().await
}

pub async fn remove_member(db: &DatabaseConnection, group_id: i64, branch_key: &str) -> Result<(), sea_orm::DbErr> {
    let txn = aperture_db::begin_immediate(db).await?;
    aperture_db::PersonGroupMember::delete_by_id((group_id, branch_key.to_string())).exec(&txn).await?;
    invalidate(&txn, group_id).await?;
    txn.commit().await
}

async fn invalidate(txn: &sea_orm::DatabaseTransaction, group_id: i64) -> Result<(), sea_orm::DbErr> {
    aperture_db::PersonGroupMatchCache::delete_many()
        .filter(aperture_db::person_group_match_cache::Column::GroupId.eq(group_id))
        .exec(txn)
        .await?;
    if let Some(group) = aperture_db::PersonGroup::find_by_id(group_id).one(txn).await? {
        let mut active: aperture_db::person_group::ActiveModel = group.into();
        active.stale = Set(true);
        active.update(txn).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn test_db() -> DatabaseConnection {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let db = aperture_db::connect(file.path()).await.expect("connect");
        aperture_migration::run(&db).await.expect("migrate");
        std::mem::forget(file);
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

    #[tokio::test]
    async fn new_group_starts_stale_with_no_cache() {
        let db = test_db().await;
        let project_id = seed_project(&db).await;
        let group_id = create_group(&db, project_id, "family").await.expect("create");

        let group = aperture_db::PersonGroup::find_by_id(group_id).one(&db).await.unwrap().unwrap();
        assert!(group.stale);
    }

    #[tokio::test]
    async fn membership_change_invalidates_stale_cache() {
        let db = test_db().await;
        let project_id = seed_project(&db).await;
        let group_id = create_group(&db, project_id, "family").await.expect("create");

        // Seed a cache row as if a prior group_index run populated it.
        aperture_db::person_group_match_cache::ActiveModel { group_id: Set(group_id), photo_id: Set(1) }
            .insert(&db)
            .await
            .expect("seed cache");
        let mut active: aperture_db::person_group::ActiveModel =
            aperture_db::PersonGroup::find_by_id(group_id).one(&db).await.unwrap().unwrap().into();
        active.stale = Set(false);
        active.update(&db).await.expect("clear stale");

        add_member(&db, group_id, "face_001").await.expect("add member");

        let group = aperture_db::PersonGroup::find_by_id(group_id).one(&db).await.unwrap().unwrap();
        assert!(group.stale);
        let cached = aperture_db::PersonGroupMatchCache::find()
            .filter(aperture_db::person_group_match_cache::Column::GroupId.eq(group_id))
            .all(&db)
            .await
            .expect("query cache");
        assert!(cached.is_empty());

        let members = aperture_db::PersonGroupMember::find()
            .filter(aperture_db::person_group_member::Column::GroupId.eq(group_id))
            .all(&db)
            .await
            .expect("query members");
        assert_eq!(members.len(), 1);

        remove_member(&db, group_id, "face_001").await.expect("remove member");
        let members = aperture_db::PersonGroupMember::find()
            .filter(aperture_db::person_group_member::Column::GroupId.eq(group_id))
            .all(&db)
            .await
            .expect("query members");
        assert!(members.is_empty());
    }
}
