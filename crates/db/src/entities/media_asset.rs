//! `media_asset` — the content-addressable layer. One row per distinct
//! `content_hash` per project; `UNIQUE(project_id, content_hash)`. First
//! writer wins `representative_photo_id` (§4.2 step 3).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "media_asset")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub asset_id: i64,
    pub project_id: i64,
    pub content_hash: String,
    pub perceptual_hash: Option<i64>,
    pub representative_photo_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
    Instances,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::project::Entity)
                .from(Column::ProjectId)
                .to(super::project::Column::Id)
                .into(),
            Self::Instances => Entity::has_many(super::media_instance::Entity).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
