//! `media_instance` — an occurrence of an asset at a path within a
//! project. `UNIQUE(project_id, asset_id, path)`. Two files with the same
//! `content_hash` in the same project collapse to one asset with multiple
//! instances ("exact duplicates", §4.3).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "media_instance")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub instance_id: i64,
    pub project_id: i64,
    pub asset_id: i64,
    pub photo_id: i64,
    pub path: String,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
    Asset,
    Photo,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::project::Entity)
                .from(Column::ProjectId)
                .to(super::project::Column::Id)
                .into(),
            Self::Asset => Entity::belongs_to(super::media_asset::Entity)
                .from(Column::AssetId)
                .to(super::media_asset::Column::AssetId)
                .into(),
            Self::Photo => Entity::belongs_to(super::photo_metadata::Entity)
                .from(Column::PhotoId)
                .to(super::photo_metadata::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
