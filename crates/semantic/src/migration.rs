//! Canonical-model migration (§4.5): switching a project's
//! `semantic_model` never deletes existing embeddings — old rows stay
//! for rollback and simply become invisible to search, since search
//! always filters by the current canonical model. This module only
//! computes the reindex set; the caller (engine crate) is responsible
//! for enqueueing it as a `semantic_embed` job.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};

use crate::error::SemanticError;

/// Photo ids under `project_id` that have no embedding row for
/// `new_model` yet (either never embedded, or only embedded under a
/// previous canonical model).
pub async fn reindex_set(
    db: &DatabaseConnection,
    project_id: i64,
    new_model: &str,
) -> Result<Vec<i64>, SemanticError> {
    let all_photo_ids: Vec<i64> = aperture_db::PhotoMetadata::find()
        .filter(aperture_db::photo_metadata::Column::ProjectId.eq(project_id))
        .select_only()
        .column(aperture_db::photo_metadata::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    let already_embedded: std::collections::HashSet<i64> = aperture_db::SemanticEmbedding::find()
        .filter(aperture_db::semantic_embedding::Column::Model.eq(new_model))
        .filter(aperture_db::semantic_embedding::Column::PhotoId.is_in(all_photo_ids.clone()))
        .select_only()
        .column(aperture_db::semantic_embedding::Column::PhotoId)
        .into_tuple()
        .all(db)
        .await?
        .into_iter()
        .collect();

    Ok(all_photo_ids.into_iter().filter(|id| !already_embedded.contains(id)).collect())
}

/// Switches the project's canonical model. Does not touch existing
/// `semantic_embeddings` rows — it only flips the pointer search reads.
pub async fn set_canonical_model(
    db: &DatabaseConnection,
    project_id: i64,
    new_model: &str,
) -> Result<(), SemanticError> {
    use sea_orm::{ActiveModelTrait, Set};

    let mut active: aperture_db::project::ActiveModel = aperture_db::Project::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or(SemanticError::ProjectNotFound(project_id))?
        .into();
    active.semantic_model = Set(new_model.to_string());
    active.update(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use sea_orm::{ActiveModelTrait, Set};

    use super::*;
    use crate::test_support::*;

    #[tokio::test]
    async fn reindex_set_excludes_photos_already_embedded_under_new_model() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let embedded = seed_photo(&db, project_id, "/root/a.jpg").await;
        let pending = seed_photo(&db, project_id, "/root/b.jpg").await;

        let (blob, dim) = crate::codec::encode_f32(&[1.0, 0.0, 0.0]);
        aperture_db::semantic_embedding::ActiveModel {
            photo_id: Set(embedded),
            model: Set("clip-vit-l14".to_string()),
            embedding: Set(blob),
            dim: Set(dim),
            source_hash: Set("whatever".to_string()),
            source_mtime: Set(chrono::Utc::now()),
        }
        .insert(&db)
        .await
        .expect("insert embedding");

        let set = reindex_set(&db, project_id, "clip-vit-l14").await.expect("reindex set");
        assert_eq!(set, vec![pending]);
    }

    #[tokio::test]
    async fn reindex_set_ignores_embeddings_under_other_models() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let photo_id = seed_photo(&db, project_id, "/root/a.jpg").await;

        let (blob, dim) = crate::codec::encode_f32(&[1.0, 0.0, 0.0]);
        aperture_db::semantic_embedding::ActiveModel {
            photo_id: Set(photo_id),
            model: Set("clip-vit-b32".to_string()),
            embedding: Set(blob),
            dim: Set(dim),
            source_hash: Set("whatever".to_string()),
            source_mtime: Set(chrono::Utc::now()),
        }
        .insert(&db)
        .await
        .expect("insert embedding");

        let set = reindex_set(&db, project_id, "clip-vit-l14").await.expect("reindex set");
        assert_eq!(set, vec![photo_id]);
    }

    #[tokio::test]
    async fn set_canonical_model_flips_pointer_without_touching_embeddings() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let photo_id = seed_photo(&db, project_id, "/root/a.jpg").await;

        let (blob, dim) = crate::codec::encode_f32(&[1.0, 0.0, 0.0]);
        aperture_db::semantic_embedding::ActiveModel {
            photo_id: Set(photo_id),
            model: Set("clip-vit-b32".to_string()),
            embedding: Set(blob),
            dim: Set(dim),
            source_hash: Set("whatever".to_string()),
            source_mtime: Set(chrono::Utc::now()),
        }
        .insert(&db)
        .await
        .expect("insert embedding");

        set_canonical_model(&db, project_id, "clip-vit-l14").await.expect("set canonical model");

        let project = aperture_db::Project::find_by_id(project_id).one(&db).await.expect("query project").unwrap();
        assert_eq!(project.semantic_model, "clip-vit-l14");

        let still_there = aperture_db::SemanticEmbedding::find()
            .filter(aperture_db::semantic_embedding::Column::PhotoId.eq(photo_id))
            .filter(aperture_db::semantic_embedding::Column::Model.eq("clip-vit-b32"))
            .one(&db)
            .await
            .expect("query embedding");
        assert!(still_there.is_some(), "old model's embedding row must survive migration");
    }

    #[tokio::test]
    async fn set_canonical_model_rejects_unknown_project() {
        let db = test_db().await;
        let result = set_canonical_model(&db, 999, "clip-vit-l14").await;
        assert!(matches!(result, Err(SemanticError::ProjectNotFound(999))));
    }
}
