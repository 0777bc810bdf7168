#[derive(Debug, thiserror::Error)]
pub enum SemanticError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    JobSystem(#[from] aperture_job_system::JobSystemError),

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("requested model `{requested}` does not match project canonical model `{canonical}`")]
    ModelMismatch { requested: String, canonical: String },

    #[error("embedding not ready for photo {photo_id}: {reason}")]
    EmbeddingNotReady { photo_id: i64, reason: String },

    #[error("project {0} not found")]
    ProjectNotFound(i64),

    #[error("corrupt embedding blob: expected {expected_len} bytes for dim {dim}, got {actual_len}")]
    CorruptEmbedding { dim: i32, expected_len: usize, actual_len: usize },
}
