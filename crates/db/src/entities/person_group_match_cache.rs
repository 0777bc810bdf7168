//! `person_group_match_cache` — materialized "AND" match: photos
//! containing *all* members of a group. Rebuilt wholesale by the
//! `group_index` job kind; never partially patched.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "person_group_match_cache")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub photo_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Group,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Group => Entity::belongs_to(super::person_group::Entity)
                .from(Column::GroupId)
                .to(super::person_group::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
