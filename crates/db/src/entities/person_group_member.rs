//! `person_group_member` — `(group_id, branch_key)`, the set membership
//! half of a [`super::person_group`].

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "person_group_member")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub branch_key: String,
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
