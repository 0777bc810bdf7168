//! `semantic_embeddings` — `(photo_id, model)` unique. `dim < 0` means the
//! packed blob is float16 (logical dimension `-dim`); `dim > 0` means
//! float32. `source_hash`/`source_mtime` are the freshness token checked
//! by the readiness gate before any search (§4.5).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "semantic_embeddings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub photo_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub model: String,
    pub embedding: Vec<u8>,
    pub dim: i32,
    pub source_hash: String,
    pub source_mtime: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Photo,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Photo => Entity::belongs_to(super::photo_metadata::Entity)
                .from(Column::PhotoId)
                .to(super::photo_metadata::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
