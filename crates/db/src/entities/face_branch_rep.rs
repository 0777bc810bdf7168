//! `face_branch_reps` — one row per person cluster ("branch"). A
//! `branch_key` of `face_NNN` is the canonical assigned form; `manual_*`
//! prefixes denote user-created branches that clustering treats as
//! must-link constraints (§4.4).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "face_branch_reps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub project_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub branch_key: String,
    pub label: Option<String>,
    pub count: i32,
    pub rep_path: Option<String>,
    pub rep_thumb_png: Option<Vec<u8>>,
    pub quality_score: f64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::project::Entity)
                .from(Column::ProjectId)
                .to(super::project::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
