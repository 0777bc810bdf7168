//! Shared fixture builders for `similarity`/`text_search` tests — a
//! minimal project + photo + asset/instance + embedding graph.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

pub async fn test_db() -> DatabaseConnection {
    let file = tempfile::NamedTempFile::new().expect("tempfile");
    let db = aperture_db::connect(file.path()).await.expect("connect");
    aperture_migration::run(&db).await.expect("migrate");
    std::mem::forget(file); // keep the backing file alive for the pool's lifetime
    db
}

pub async fn seed_project(db: &DatabaseConnection, model: &str) -> i64 {
    let project = aperture_db::project::ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        name: Set("test".to_string()),
        root_folder: Set("/root".to_string()),
        mode: Set("local".to_string()),
        semantic_model: Set(model.to_string()),
        face_eps: Set(0.35),
        face_min_samples: Set(3),
        created_at: Set(Utc::now()),
    };
    project.insert(db).await.expect("insert project").id
}

/// `(parent_id, name)` is unique, so every fixture in a test shares the
/// single root folder rather than each creating its own.
async fn root_folder_id(db: &DatabaseConnection) -> i64 {
    use sea_orm::EntityTrait;
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

/// Seeds a photo with its own asset+instance (content_hash derived from
/// the path, so distinct photos never collide) and returns the photo id.
pub async fn seed_photo(db: &DatabaseConnection, project_id: i64, path: &str) -> i64 {
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
        faces_status: Set("pending".to_string()),
        embed_status: Set("pending".to_string()),
    };
    let photo_id = photo.insert(db).await.expect("insert photo").id;

    let asset = aperture_db::media_asset::ActiveModel {
        asset_id: sea_orm::ActiveValue::NotSet,
        project_id: Set(project_id),
        content_hash: Set(format!("hash_{path}")),
        perceptual_hash: Set(None),
        representative_photo_id: Set(photo_id),
    };
    let asset_id = asset.insert(db).await.expect("insert asset").asset_id;

    aperture_db::media_instance::ActiveModel {
        instance_id: sea_orm::ActiveValue::NotSet,
        project_id: Set(project_id),
        asset_id: Set(asset_id),
        photo_id: Set(photo_id),
        path: Set(path.to_string()),
    }
    .insert(db)
    .await
    .expect("insert instance");

    photo_id
}

/// Adds a second instance path pointing at the same asset as `photo_id`
/// (an exact-duplicate sibling), returning the new photo id.
pub async fn seed_duplicate_instance(db: &DatabaseConnection, project_id: i64, of_photo_id: i64, path: &str) -> i64 {
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    let instance = aperture_db::MediaInstance::find()
        .filter(aperture_db::media_instance::Column::PhotoId.eq(of_photo_id))
        .one(db)
        .await
        .expect("query instance")
        .expect("instance exists");

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
        faces_status: Set("pending".to_string()),
        embed_status: Set("pending".to_string()),
    };
    let photo_id = photo.insert(db).await.expect("insert photo").id;

    aperture_db::media_instance::ActiveModel {
        instance_id: sea_orm::ActiveValue::NotSet,
        project_id: Set(project_id),
        asset_id: Set(instance.asset_id),
        photo_id: Set(photo_id),
        path: Set(path.to_string()),
    }
    .insert(db)
    .await
    .expect("insert instance");

    photo_id
}

pub async fn seed_embedding(db: &DatabaseConnection, photo_id: i64, model: &str, vector: &[f32]) {
    let mut normalized = vector.to_vec();
    aperture_semantic::l2_normalize(&mut normalized);
    let (blob, dim) = aperture_semantic::encode_f32(&normalized);

    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    let instance = aperture_db::MediaInstance::find()
        .filter(aperture_db::media_instance::Column::PhotoId.eq(photo_id))
        .one(db)
        .await
        .expect("query instance")
        .expect("instance exists");
    let asset = aperture_db::MediaAsset::find_by_id(instance.asset_id).one(db).await.expect("query asset").unwrap();

    aperture_db::semantic_embedding::ActiveModel {
        photo_id: Set(photo_id),
        model: Set(model.to_string()),
        embedding: Set(blob),
        dim: Set(dim),
        source_hash: Set(asset.content_hash),
        source_mtime: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert embedding");
}
