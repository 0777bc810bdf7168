use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum JobSystemError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("job {0} is not in a state that allows this transition")]
    InvalidTransition(Uuid),

    #[error("no runner registered for job kind `{0}`")]
    NoRunner(String),

    #[error("worker lost its lease on job {0}, another owner has claimed it")]
    LeaseLost(Uuid),

    #[error("timed out waiting for model load for job {0}")]
    ModelLoadTimeout(Uuid),

    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
