//! `asset_stack` — a persisted similar-photo stack (§4.3 expansion). The
//! representative pointer and explicit "unstack" removals are sticky
//! across reclusterings: a reclustering pass rebuilds membership but
//! never silently overrides a user's chosen representative.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "asset_stack")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub project_id: i64,
    pub representative_asset_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
    Members,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::project::Entity)
                .from(Column::ProjectId)
                .to(super::project::Column::Id)
                .into(),
            Self::Members => Entity::has_many(super::asset_stack_member::Entity).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
