#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    JobSystem(#[from] aperture_job_system::JobSystemError),

    #[error("stack {0} not found")]
    StackNotFound(i64),

    #[error("asset {0} is not a member of stack {1}")]
    NotAMember(i64, i64),

    #[error("cannot unstack the last non-representative member of stack {0}")]
    StackWouldBeEmpty(i64),
}
