//! `tags` — `(name, project_id)` unique. Project-scoped: tags must never
//! leak across projects (§3, historical bug called out by name).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub project_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
    PhotoTags,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::project::Entity)
                .from(Column::ProjectId)
                .to(super::project::Column::Id)
                .into(),
            Self::PhotoTags => Entity::has_many(super::photo_tag::Entity).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
