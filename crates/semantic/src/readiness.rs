//! Readiness gate (§4.5): callers that need a trustworthy embedding —
//! similarity search, text search — must check this before reading, so
//! a stale or missing row never silently produces a wrong answer.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::error::SemanticError;

pub async fn check_readiness(db: &DatabaseConnection, project_id: i64, photo_id: i64) -> Result<(), SemanticError> {
    let project =
        aperture_db::Project::find_by_id(project_id).one(db).await?.ok_or(SemanticError::ProjectNotFound(project_id))?;

    let Some(instance) = aperture_db::MediaInstance::find()
        .filter(aperture_db::media_instance::Column::PhotoId.eq(photo_id))
        .one(db)
        .await?
    else {
        return Err(SemanticError::EmbeddingNotReady { photo_id, reason: "no instance for photo".into() });
    };
    let Some(asset) = aperture_db::MediaAsset::find_by_id(instance.asset_id).one(db).await? else {
        return Err(SemanticError::EmbeddingNotReady { photo_id, reason: "asset missing".into() });
    };

    let Some(row) = aperture_db::SemanticEmbedding::find()
        .filter(aperture_db::semantic_embedding::Column::PhotoId.eq(photo_id))
        .filter(aperture_db::semantic_embedding::Column::Model.eq(&project.semantic_model))
        .one(db)
        .await?
    else {
        return Err(SemanticError::EmbeddingNotReady {
            photo_id,
            reason: format!("no embedding under canonical model `{}`", project.semantic_model),
        });
    };

    if row.source_hash != asset.content_hash {
        return Err(SemanticError::EmbeddingNotReady { photo_id, reason: "embedding stale: content has changed".into() });
    }

    if let Err(corrupt) = crate::codec::decode(&row.embedding, row.dim) {
        tracing::warn!(photo_id, model = %project.semantic_model, error = %corrupt, "embedding row corrupt, excluding from search");
        return Err(SemanticError::EmbeddingNotReady { photo_id, reason: corrupt.to_string() });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use sea_orm::{ActiveModelTrait, Set};

    use super::*;
    use crate::test_support::*;

    #[tokio::test]
    async fn missing_instance_is_not_ready() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;

        let result = check_readiness(&db, project_id, 999).await;
        assert!(matches!(result, Err(SemanticError::EmbeddingNotReady { photo_id: 999, .. })));
    }

    #[tokio::test]
    async fn missing_embedding_under_canonical_model_is_not_ready() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let photo_id = seed_photo(&db, project_id, "/root/a.jpg").await;

        let result = check_readiness(&db, project_id, photo_id).await;
        assert!(matches!(result, Err(SemanticError::EmbeddingNotReady { .. })));
    }

    #[tokio::test]
    async fn stale_source_hash_is_not_ready() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let photo_id = seed_photo(&db, project_id, "/root/a.jpg").await;

        let (blob, dim) = crate::codec::encode_f32(&[1.0, 0.0, 0.0]);
        aperture_db::semantic_embedding::ActiveModel {
            photo_id: Set(photo_id),
            model: Set("clip-vit-b32".to_string()),
            embedding: Set(blob),
            dim: Set(dim),
            source_hash: Set("stale_hash".to_string()),
            source_mtime: Set(chrono::Utc::now()),
        }
        .insert(&db)
        .await
        .expect("insert embedding");

        let result = check_readiness(&db, project_id, photo_id).await;
        assert!(matches!(result, Err(SemanticError::EmbeddingNotReady { .. })));
    }

    #[tokio::test]
    async fn fresh_embedding_under_canonical_model_is_ready() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let photo_id = seed_photo(&db, project_id, "/root/a.jpg").await;
        let content_hash = asset_content_hash(&db, photo_id).await;

        let (blob, dim) = crate::codec::encode_f32(&[1.0, 0.0, 0.0]);
        aperture_db::semantic_embedding::ActiveModel {
            photo_id: Set(photo_id),
            model: Set("clip-vit-b32".to_string()),
            embedding: Set(blob),
            dim: Set(dim),
            source_hash: Set(content_hash),
            source_mtime: Set(chrono::Utc::now()),
        }
        .insert(&db)
        .await
        .expect("insert embedding");

        check_readiness(&db, project_id, photo_id).await.expect("should be ready");
    }
}
