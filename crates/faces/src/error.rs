#[derive(Debug, thiserror::Error)]
pub enum FacesError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    JobSystem(#[from] aperture_job_system::JobSystemError),

    #[error("detector error: {0}")]
    Detector(String),

    #[error("embedder error: {0}")]
    Embedder(String),

    #[error("crop {0} has no embedding stored")]
    MissingEmbedding(i64),
}
