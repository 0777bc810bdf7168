//! `photo_folders` — a global hierarchical node. Folders are shared across
//! projects; project membership of media is expressed by `photo_metadata`
//! / `video_metadata`, not here. Invariant: `(parent_id, name)` unique per
//! tree level.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "photo_folders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub parent_id: Option<i64>,
    pub path: String,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Parent,
    Children,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Parent => Entity::belongs_to(Entity)
                .from(Column::ParentId)
                .to(Column::Id)
                .into(),
            Self::Children => Entity::has_many(Entity).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
