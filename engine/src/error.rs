#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Migration(#[from] aperture_migration::MigrationError),

    #[error(transparent)]
    JobSystem(#[from] aperture_job_system::JobSystemError),

    #[error(transparent)]
    Dedup(#[from] aperture_dedup::DedupError),

    #[error(transparent)]
    Semantic(#[from] aperture_semantic::SemanticError),

    #[error(transparent)]
    Search(#[from] aperture_search::SearchError),

    #[error("project {0} not found")]
    ProjectNotFound(i64),
}
