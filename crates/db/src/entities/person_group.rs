//! `person_group` — a user-defined set of branch_keys, §3. The member list
//! lives in [`super::person_group_member`]; the materialized AND-match
//! cache lives in [`super::person_group_match_cache`] and is invalidated
//! (rows deleted, `stale` set) on membership change.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "person_group")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub stale: bool,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
    Members,
    MatchCache,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::project::Entity)
                .from(Column::ProjectId)
                .to(super::project::Column::Id)
                .into(),
            Self::Members => Entity::has_many(super::person_group_member::Entity).into(),
            Self::MatchCache => Entity::has_many(super::person_group_match_cache::Entity).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
