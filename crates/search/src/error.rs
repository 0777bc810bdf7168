#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Semantic(#[from] aperture_semantic::SemanticError),

    #[error("text encoder error: {0}")]
    Encoder(String),
}
