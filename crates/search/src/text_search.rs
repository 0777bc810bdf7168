//! Semantic text -> image search (§4.6). Cancellable: typing a new
//! query bumps a generation counter, and the previous search notices
//! at its next cooperative yield point and returns an empty response
//! instead of racing the new one to the UI.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::error::SearchError;
use crate::similarity::SimilarityHit;

#[derive(Debug, Default)]
pub struct SearchCancellation {
    generation: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchToken(u64);

impl SearchCancellation {
    /// Call when starting a new query: supersedes any in-flight search.
    pub fn begin(&self) -> SearchToken {
        SearchToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_current(&self, token: SearchToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.0
    }
}

pub async fn search_text(
    db: &DatabaseConnection,
    encoder: &dyn aperture_semantic::TextEncoder,
    cancellation: &SearchCancellation,
    token: SearchToken,
    project_id: i64,
    query: &str,
    top_k: usize,
    threshold: f32,
) -> Result<Vec<SimilarityHit>, SearchError> {
    let project = aperture_db::Project::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or(SearchError::Semantic(aperture_semantic::SemanticError::ProjectNotFound(project_id)))?;

    if encoder.model_name() != project.semantic_model {
        return Err(SearchError::Semantic(aperture_semantic::SemanticError::ModelMismatch {
            requested: encoder.model_name().to_string(),
            canonical: project.semantic_model,
        }));
    }

    let mut query_vector = encoder.encode_text(query).await.map_err(SearchError::Encoder)?;
    aperture_semantic::l2_normalize(&mut query_vector);

    if !cancellation.is_current(token) {
        return Ok(Vec::new());
    }

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
    for (i, embedding_row) in candidates.into_iter().enumerate() {
        if i % 256 == 0 && !cancellation.is_current(token) {
            return Ok(Vec::new());
        }
        let Some(path) = paths_by_id.get(&embedding_row.photo_id) else { continue };
        let vector = match aperture_semantic::decode(&embedding_row.embedding, embedding_row.dim) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(photo_id = embedding_row.photo_id, error = %e, "corrupt embedding, excluding from text search");
                continue;
            }
        };
        let score = aperture_semantic::cosine_similarity(&query_vector, &vector);
        if score >= threshold {
            scored.push(SimilarityHit { photo_id: embedding_row.photo_id, score, path: path.clone() });
        }
    }

    if !cancellation.is_current(token) {
        return Ok(Vec::new());
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    Ok(scored)
}

pub type SharedCancellation = Arc<SearchCancellation>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    struct StubTextEncoder {
        model: &'static str,
        vector: Vec<f32>,
    }

    #[async_trait::async_trait]
    impl aperture_semantic::TextEncoder for StubTextEncoder {
        fn model_name(&self) -> &str {
            self.model
        }

        async fn encode_text(&self, _query: &str) -> Result<Vec<f32>, String> {
            Ok(self.vector.clone())
        }
    }

    #[tokio::test]
    async fn finds_matching_photo_above_threshold() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let photo_id = seed_photo(&db, project_id, "/root/cat.jpg").await;
        seed_embedding(&db, photo_id, "clip-vit-b32", &[1.0, 0.0, 0.0]).await;

        let encoder = StubTextEncoder { model: "clip-vit-b32", vector: vec![1.0, 0.0, 0.0] };
        let cancellation = SearchCancellation::default();
        let token = cancellation.begin();

        let hits = search_text(&db, &encoder, &cancellation, token, project_id, "a cat", 10, 0.5)
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].photo_id, photo_id);
    }

    #[tokio::test]
    async fn model_mismatch_fails_before_any_scoring() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;

        let encoder = StubTextEncoder { model: "other-model", vector: vec![1.0, 0.0, 0.0] };
        let cancellation = SearchCancellation::default();
        let token = cancellation.begin();

        let result = search_text(&db, &encoder, &cancellation, token, project_id, "a cat", 10, 0.5).await;
        assert!(matches!(
            result,
            Err(SearchError::Semantic(aperture_semantic::SemanticError::ModelMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn superseded_token_returns_empty() {
        let db = test_db().await;
        let project_id = seed_project(&db, "clip-vit-b32").await;
        let photo_id = seed_photo(&db, project_id, "/root/cat.jpg").await;
        seed_embedding(&db, photo_id, "clip-vit-b32", &[1.0, 0.0, 0.0]).await;

        let encoder = StubTextEncoder { model: "clip-vit-b32", vector: vec![1.0, 0.0, 0.0] };
        let cancellation = SearchCancellation::default();
        let stale_token = cancellation.begin();
        let _current_token = cancellation.begin(); // supersedes stale_token

        let hits = search_text(&db, &encoder, &cancellation, stale_token, project_id, "a cat", 10, 0.5)
            .await
            .expect("search");
        assert!(hits.is_empty());
    }
}
