//! Photo-similarity search (§4.6): cosine top-k over the project's
//! canonical-model embedding pool, excluding the reference photo and
//! every instance sibling of its asset (exact duplicates are §4.3's
//! job, and would otherwise dominate results).

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::error::SearchError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SimilarityHit {
    pub photo_id: i64,
    pub score: f32,
    pub path: String,
}

/// Photo ids sharing an asset with `photo_id` (itself included), i.e.
/// exact-duplicate instances that similarity search must not surface.
async fn asset_sibling_photo_ids(
    db: &DatabaseConnection,
    project_id: i64,
    photo_id: i64,
) -> Result<std::collections::HashSet<i64>, SearchError> {
    let mut siblings = std::collections::HashSet::new();
    siblings.insert(photo_id);

    let Some(instance) = aperture_db::MediaInstance::find()
        .filter(aperture_db::media_instance::Column::ProjectId.eq(project_id))
        .filter(aperture_db::media_instance::Column::PhotoId.eq(photo_id))
        .one(db)
        .await?
    else {
        return Ok(siblings);
    };

    let sibling_instances = aperture_db::MediaInstance::find()
        .filter(aperture_db::media_instance::Column::AssetId.eq(instance.asset_id))
        .all(db)
        .await?;
    siblings.extend(sibling_instances.into_iter().map(|i| i.photo_id));

    Ok(siblings)
}

pub async fn find_similar(
    db: &DatabaseConnection,
    project_id: i64,
    photo_id: i64,
    top_k: usize,
    threshold: f32,
) -> Result<Vec<SimilarityHit>, SearchError> {
    aperture_semantic::check_readiness(db, project_id, photo_id).await?;

    let project = aperture_db::Project::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or(SearchError::Semantic(aperture_semantic::SemanticError::ProjectNotFound(project_id)))?;

    let reference = aperture_db::SemanticEmbedding::find()
        .filter(aperture_db::semantic_embedding::Column::PhotoId.eq(photo_id))
        .filter(aperture_db::semantic_embedding::Column::Model.eq(&project.semantic_model))
        .one(db)
        .await?;
    let Some(reference) = reference else {
        return Ok(Vec::new());
    };
    let ref_vector = aperture_semantic::decode(&reference.embedding, reference.dim).map_err(SearchError::Semantic)?;

    let exclude = asset_sibling_photo_ids(db, project_id, photo_id).await?;

    let project_photos = aperture_db::PhotoMetadata::find()
        .filter(aperture_db::photo_metadata::Column::ProjectId.eq(project_id))
        .all(db)
        .await?;
    let paths_by_id: std::collections::HashMap<i64, String> =
        project_photos.into_iter().map(|p| (p.id, p.path)).collect();

    let candidates = aperture_db::SemanticEmbedding::find()
        .filter(aperture_db::semantic_embedding::Column::Model.eq(&project.semantic_model))
        .filter(aperture_db::semantic_embedding::Column::PhotoId.is_in(paths_by_id.keys().copied()))
        .all(db)
        .await?;

    let mut scored = Vec::new();
    for embedding_row in candidates {
        if exclude.contains(&embedding_row.photo_id) {
            continue;
        }
        let Some(path) = paths_by_id.get(&embedding_row.photo_id) else { continue };
        let vector = match aperture_semantic::decode(&embedding_row.embedding, embedding_row.dim) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(photo_id = embedding_row.photo_id, error = %e, "corrupt embedding, excluding from similarity search");
                continue;
            }
        };
        let score = aperture_semantic::cosine_similarity(&ref_vector, &vector);
        if score >= threshold {
            scored.push(SimilarityHit { photo_id: embedding_row.photo_id, score, path: path.clone() });
        }
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[tokio::test]
    async fn excludes_reference_and_ranks_by_cosine() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;

        let reference = seed_photo(&db, project_id, "/root/ref.jpg").await;
        let close = seed_photo(&db, project_id, "/root/close.jpg").await;
        let far = seed_photo(&db, project_id, "/root/far.jpg").await;

        seed_embedding(&db, reference, "clip-vit-b32", &[1.0, 0.0, 0.0]).await;
        seed_embedding(&db, close, "clip-vit-b32", &[0.9, 0.1, 0.0]).await;
        seed_embedding(&db, far, "clip-vit-b32", &[0.0, 1.0, 0.0]).await;

        let hits = find_similar(&db, project_id, reference, 10, 0.5).await.expect("search");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].photo_id, close);
    }

    #[tokio::test]
    async fn excludes_exact_duplicate_siblings() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;

        let reference = seed_photo(&db, project_id, "/root/ref.jpg").await;
        let duplicate = seed_duplicate_instance(&db, project_id, reference, "/root/ref_copy.jpg").await;

        seed_embedding(&db, reference, "clip-vit-b32", &[1.0, 0.0, 0.0]).await;
        seed_embedding(&db, duplicate, "clip-vit-b32", &[1.0, 0.0, 0.0]).await;

        let hits = find_similar(&db, project_id, reference, 10, 0.0).await.expect("search");
        assert!(hits.is_empty(), "exact-duplicate instance must not appear in similarity results");
    }

    #[tokio::test]
    async fn missing_embedding_returns_not_ready_error() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let photo_id = seed_photo(&db, project_id, "/root/never_embedded.jpg").await;

        let result = find_similar(&db, project_id, photo_id, 10, 0.0).await;
        assert!(matches!(
            result,
            Err(SearchError::Semantic(aperture_semantic::SemanticError::EmbeddingNotReady { .. }))
        ));
    }
}
