//! `asset_stack_member` — `(stack_id, asset_id)`. Deleting the last
//! non-representative member collapses the stack (§4.3).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "asset_stack_member")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub stack_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub asset_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Stack,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Stack => Entity::belongs_to(super::asset_stack::Entity)
                .from(Column::StackId)
                .to(super::asset_stack::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
